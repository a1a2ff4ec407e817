use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// Options for a one-shot position read
pub struct PositionOptions {
    /// Ask the platform for the most accurate fix it can give
    pub high_accuracy: bool,
    /// Accuracy hint passed to Android's fused location provider
    pub android_accuracy: String,
    /// Accuracy hint passed to CoreLocation
    pub ios_accuracy: String,
}

impl PositionOptions {
    pub fn new(high_accuracy: bool) -> Self {
        Self {
            high_accuracy,
            ..Default::default()
        }
    }
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            android_accuracy: "high".to_string(),
            ios_accuracy: "bestForNavigation".to_string(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location provider is not available")]
    PositionUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Failed to get location: {0}")]
    Other(String),
}

impl LocationError {
    /// Numeric code matching the W3C `GeolocationPositionError` codes, `-1` for anything else
    pub const fn code(&self) -> i32 {
        match self {
            Self::PermissionDenied => 1,
            Self::PositionUnavailable => 2,
            Self::Timeout => 3,
            Self::Other(_) => -1,
        }
    }
}

pub trait LocationService: Send + Sync {
    /// Read the current position once
    fn current_position(
        &self,
        options: &PositionOptions,
    ) -> impl Future<Output = Result<GeoPoint, LocationError>> + Send;
}
