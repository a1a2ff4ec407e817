use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use geotrack_logic::{
    DistanceSample, ForegroundService, GeoPoint, LocationError, LocationService, PermissionBackend,
    PermissionKey, PermissionStatus, PositionOptions, SampleSender, ServiceNotification,
    SettingsPrompt,
};
use log::{info, warn};

pub mod prelude {
    pub use anyhow::{Context, anyhow, bail};
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;

/// Pretend OS permission store. Requests are answered with `answer` unless the permission
/// is already granted or blocked.
#[derive(Clone)]
pub struct SimPermissions {
    statuses: Arc<Mutex<HashMap<PermissionKey, PermissionStatus>>>,
    answer: PermissionStatus,
}

impl SimPermissions {
    pub fn new(
        location: PermissionStatus,
        background: PermissionStatus,
        answer: PermissionStatus,
    ) -> Self {
        let statuses = HashMap::from_iter([
            (PermissionKey::Location, location),
            (PermissionKey::BackgroundLocation, background),
        ]);
        Self {
            statuses: Arc::new(Mutex::new(statuses)),
            answer,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PermissionKey, PermissionStatus>> {
        self.statuses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn get(&self, key: PermissionKey) -> PermissionStatus {
        self.lock()
            .get(&key)
            .copied()
            .unwrap_or(PermissionStatus::Unavailable)
    }

    pub fn set(&self, key: PermissionKey, status: PermissionStatus) {
        self.lock().insert(key, status);
    }

    pub fn grant_all(&self) {
        for key in PermissionKey::ALL {
            self.set(key, PermissionStatus::Granted);
        }
    }
}

impl PermissionBackend for SimPermissions {
    async fn check(&self, key: PermissionKey) -> Result<PermissionStatus> {
        Ok(self.get(key))
    }

    async fn request(&self, key: PermissionKey) -> Result<PermissionStatus> {
        let status = match self.get(key) {
            PermissionStatus::Denied | PermissionStatus::Limited => {
                info!("Prompting for {key:?}, user answers {:?}", self.answer);
                self.answer
            }
            other => other,
        };
        self.set(key, status);
        Ok(status)
    }
}

/// Answers the settings dialog with a fixed choice. Visiting settings grants everything
/// when `grant_in_settings` is set.
pub struct SimPrompt {
    permissions: SimPermissions,
    open: bool,
    grant_in_settings: bool,
}

impl SimPrompt {
    pub fn new(permissions: SimPermissions, open: bool, grant_in_settings: bool) -> Self {
        Self {
            permissions,
            open,
            grant_in_settings,
        }
    }
}

impl SettingsPrompt for SimPrompt {
    async fn confirm_open_settings(&self, title: &str, message: &str) -> bool {
        info!(
            "[dialog] {title}: {message} -> {}",
            if self.open { "Set Setting" } else { "Cancel" }
        );
        self.open
    }

    async fn open_settings(&self) -> Result {
        info!("[settings] Opened system settings, send `resume` to come back");
        if self.grant_in_settings {
            self.permissions.grant_all();
        }
        Ok(())
    }
}

/// Random walk around a starting point, fails when location permission is missing
pub struct SimLocation {
    permissions: SimPermissions,
    position: Mutex<GeoPoint>,
    step_degrees: f64,
    fail_percent: u32,
}

impl SimLocation {
    pub fn new(
        permissions: SimPermissions,
        start: GeoPoint,
        step_degrees: f64,
        fail_percent: u32,
    ) -> Self {
        Self {
            permissions,
            position: Mutex::new(start),
            step_degrees,
            fail_percent,
        }
    }

    fn step(&self) -> GeoPoint {
        let mut position = self
            .position
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if self.step_degrees > 0.0 {
            position.latitude = (position.latitude
                + rand::random_range(-self.step_degrees..=self.step_degrees))
            .clamp(-90.0, 90.0);
            position.longitude = (position.longitude
                + rand::random_range(-self.step_degrees..=self.step_degrees))
            .clamp(-180.0, 180.0);
        }
        *position
    }
}

impl LocationService for SimLocation {
    async fn current_position(&self, _options: &PositionOptions) -> Result<GeoPoint, LocationError> {
        let allowed = [PermissionStatus::Granted, PermissionStatus::Limited];
        if !allowed.contains(&self.permissions.get(PermissionKey::Location)) {
            return Err(LocationError::PermissionDenied);
        }

        if self.fail_percent > 0 && rand::random_range(0..100) < self.fail_percent {
            return Err(LocationError::PositionUnavailable);
        }

        Ok(self.step())
    }
}

/// Logs the notification instead of showing one
#[derive(Default)]
pub struct SimForeground;

impl ForegroundService for SimForeground {
    async fn start(&self, notification: &ServiceNotification) -> Result {
        info!(
            "[notification #{}] {}: {}",
            notification.id, notification.title, notification.message
        );
        Ok(())
    }

    async fn stop(&self) -> Result {
        info!("[notification] Removed");
        Ok(())
    }
}

/// Prints every sample as a line of JSON on stdout
pub struct PrintSender;

impl SampleSender for PrintSender {
    fn send_sample(&self, sample: &DistanceSample) {
        match serde_json::to_string(sample) {
            Ok(line) => println!("{line}"),
            Err(why) => warn!("Couldn't serialize sample: {why:?}"),
        }
    }
}
