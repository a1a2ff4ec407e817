use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    controller::{ServiceNotification, ServiceOptions},
    geo::GeoPoint,
    location::PositionOptions,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, specta::Type)]
#[serde(default)]
/// User adjustable settings for location tracking
pub struct TrackerSettings {
    /// Milliseconds between location samples
    pub task_delay_ms: u32,
    /// Point distances are measured from
    pub origin: GeoPoint,
    /// How many rounds of permission requests to make before giving up on a denied permission
    pub max_permission_attempts: u32,
    /// Whether to ask for a high accuracy fix on every sample
    pub high_accuracy: bool,
    /// Notification shown while tracking
    pub notification: ServiceNotification,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            task_delay_ms: 500,
            origin: GeoPoint::default(),
            max_permission_attempts: 3,
            high_accuracy: true,
            notification: ServiceNotification::default(),
        }
    }
}

impl TrackerSettings {
    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            delay: Duration::from_millis(self.task_delay_ms.into()),
            notification: self.notification.clone(),
        }
    }

    pub fn position_options(&self) -> PositionOptions {
        PositionOptions::new(self.high_accuracy)
    }
}
