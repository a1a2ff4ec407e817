use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::prelude::*;

pub const SETTINGS_PROMPT_TITLE: &str = "Location permission needed!";
pub const SETTINGS_PROMPT_MESSAGE: &str = "Click the settings button to change the settings";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// OS reported authorization status for a single permission
pub enum PermissionStatus {
    /// The user allowed it
    Granted,
    /// Not granted yet, but we're still allowed to ask
    Denied,
    /// Denied and the OS won't show the prompt again, only the settings screen can change it
    Blocked,
    /// The feature isn't available on this device, or the status couldn't be read
    Unavailable,
    /// Granted with restrictions (approximate location)
    Limited,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, specta::Type)]
/// The permissions needed to track location from the background
pub enum PermissionKey {
    /// Precise location while the app is in use
    Location,
    /// Location access while the app is in the background
    BackgroundLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub const fn current() -> Option<Self> {
        if cfg!(target_os = "android") {
            Some(Self::Android)
        } else if cfg!(target_os = "ios") {
            Some(Self::Ios)
        } else {
            None
        }
    }
}

impl PermissionKey {
    pub const ALL: [Self; 2] = [Self::Location, Self::BackgroundLocation];

    /// Platform specific identifier of this permission
    pub const fn platform_name(&self, platform: Platform) -> &'static str {
        match (platform, self) {
            (Platform::Android, Self::Location) => "android.permission.ACCESS_FINE_LOCATION",
            (Platform::Android, Self::BackgroundLocation) => {
                "android.permission.ACCESS_BACKGROUND_LOCATION"
            }
            (Platform::Ios, Self::Location) => "ios.permission.LOCATION_WHEN_IN_USE",
            (Platform::Ios, Self::BackgroundLocation) => "ios.permission.LOCATION_ALWAYS",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// Status of every permission in [PermissionKey::ALL]
pub struct PermissionReport {
    pub location: PermissionStatus,
    pub background_location: PermissionStatus,
}

impl Default for PermissionReport {
    fn default() -> Self {
        Self {
            location: PermissionStatus::Unavailable,
            background_location: PermissionStatus::Unavailable,
        }
    }
}

impl PermissionReport {
    pub fn new(location: PermissionStatus, background_location: PermissionStatus) -> Self {
        Self {
            location,
            background_location,
        }
    }

    pub fn get(&self, key: PermissionKey) -> PermissionStatus {
        match key {
            PermissionKey::Location => self.location,
            PermissionKey::BackgroundLocation => self.background_location,
        }
    }

    pub fn set(&mut self, key: PermissionKey, status: PermissionStatus) {
        match key {
            PermissionKey::Location => self.location = status,
            PermissionKey::BackgroundLocation => self.background_location = status,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PermissionKey, PermissionStatus)> + '_ {
        PermissionKey::ALL.into_iter().map(|key| (key, self.get(key)))
    }

    pub fn any(&self, status: PermissionStatus) -> bool {
        self.iter().any(|(_, s)| s == status)
    }

    pub fn any_granted(&self) -> bool {
        self.any(PermissionStatus::Granted)
    }

    pub fn all_granted(&self) -> bool {
        self.iter().all(|(_, s)| s == PermissionStatus::Granted)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Location permission was still denied after {attempts} attempts")]
    Denied {
        attempts: u32,
        report: PermissionReport,
    },
    #[error("Location permission is blocked, it can only be changed from system settings")]
    Blocked(PermissionReport),
}

impl PermissionError {
    pub fn report(&self) -> &PermissionReport {
        match self {
            Self::Denied { report, .. } | Self::Blocked(report) => report,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// Foreground state of the app
pub enum AppLifecycle {
    Active,
    Inactive,
    Background,
}

/// Access to the OS permission subsystem
pub trait PermissionBackend: Send + Sync {
    /// Get the current status of a permission without prompting
    fn check(&self, key: PermissionKey) -> impl Future<Output = Result<PermissionStatus>> + Send;
    /// Prompt the user for a permission, resolves once they answer
    fn request(&self, key: PermissionKey)
    -> impl Future<Output = Result<PermissionStatus>> + Send;
}

/// Lets the user jump to the system settings screen when a permission is blocked
pub trait SettingsPrompt: Send + Sync {
    /// Show a confirmation dialog, resolves to true if the user chose to open settings
    fn confirm_open_settings(&self, title: &str, message: &str)
    -> impl Future<Output = bool> + Send;
    /// Open the app's page in system settings
    fn open_settings(&self) -> impl Future<Output = Result> + Send;
}

/// Figures out whether we can read location, asks for it when we can't, and re-checks once
/// the user comes back from system settings.
pub struct PermissionCoordinator<P: PermissionBackend, D: SettingsPrompt> {
    backend: P,
    prompt: D,
    max_attempts: AtomicU32,
    settings_return_expected: AtomicBool,
    lifecycle: Mutex<AppLifecycle>,
}

impl<P: PermissionBackend, D: SettingsPrompt> PermissionCoordinator<P, D> {
    pub fn new(backend: P, prompt: D, max_attempts: u32) -> Self {
        Self {
            backend,
            prompt,
            max_attempts: AtomicU32::new(max_attempts.max(1)),
            settings_return_expected: AtomicBool::new(false),
            lifecycle: Mutex::new(AppLifecycle::Active),
        }
    }

    /// Change how many request rounds [Self::ensure_permission] makes, at least one
    pub fn set_max_attempts(&self, max_attempts: u32) {
        self.max_attempts.store(max_attempts.max(1), Ordering::SeqCst);
    }

    /// Whether we sent the user to system settings and haven't seen them come back yet
    pub fn settings_return_expected(&self) -> bool {
        self.settings_return_expected.load(Ordering::SeqCst)
    }

    async fn check_key(&self, key: PermissionKey) -> PermissionStatus {
        match self.backend.check(key).await {
            Ok(status) => status,
            Err(why) => {
                warn!("Failed to check {key:?} permission: {why:?}");
                PermissionStatus::Unavailable
            }
        }
    }

    async fn request_key(&self, key: PermissionKey) -> PermissionStatus {
        match self.backend.request(key).await {
            Ok(status) => status,
            Err(why) => {
                warn!("Failed to request {key:?} permission: {why:?}");
                PermissionStatus::Unavailable
            }
        }
    }

    /// Get the current status of all location permissions, never prompts
    pub async fn check_permission(&self) -> PermissionReport {
        let mut report = PermissionReport::default();
        for key in PermissionKey::ALL {
            report.set(key, self.check_key(key).await);
        }
        report
    }

    async fn request_missing(&self) -> PermissionReport {
        let mut report = self.check_permission().await;
        for key in PermissionKey::ALL {
            if report.get(key) != PermissionStatus::Granted {
                report.set(key, self.request_key(key).await);
            }
        }
        report
    }

    async fn ask_open_settings(&self) {
        let open = self
            .prompt
            .confirm_open_settings(SETTINGS_PROMPT_TITLE, SETTINGS_PROMPT_MESSAGE)
            .await;

        if !open {
            info!("User dismissed the settings prompt");
            return;
        }

        self.settings_return_expected.store(true, Ordering::SeqCst);
        if let Err(why) = self.prompt.open_settings().await {
            error!("Failed to open system settings: {why:?}");
        }
    }

    /// Request every permission that isn't granted yet. Denied permissions are asked for
    /// again up to `max_attempts` rounds, blocked permissions prompt the user to go to
    /// system settings.
    pub async fn ensure_permission(&self) -> Result<PermissionReport, PermissionError> {
        let max_attempts = self.max_attempts.load(Ordering::SeqCst);
        let mut attempts = 0;

        let report = loop {
            attempts += 1;
            let report = self.request_missing().await;
            if report.any(PermissionStatus::Denied) && attempts < max_attempts {
                debug!(
                    "Location permission denied (attempt {attempts}/{max_attempts}), asking again"
                );
                continue;
            }
            break report;
        };

        let blocked = report.any(PermissionStatus::Blocked);
        if blocked {
            self.ask_open_settings().await;
        }

        if report.any(PermissionStatus::Denied) {
            Err(PermissionError::Denied { attempts, report })
        } else if blocked {
            Err(PermissionError::Blocked(report))
        } else {
            Ok(report)
        }
    }

    /// Feed an app lifecycle transition in. When the app comes back to the foreground after
    /// we opened system settings, returns the freshly checked permissions.
    pub async fn handle_lifecycle_change(&self, next: AppLifecycle) -> Option<PermissionReport> {
        let previous = std::mem::replace(&mut *self.lifecycle.lock().await, next);

        let resumed = next == AppLifecycle::Active && previous != AppLifecycle::Active;
        if resumed && self.settings_return_expected.swap(false, Ordering::SeqCst) {
            info!("Returned from system settings, checking permissions again");
            Some(self.check_permission().await)
        } else {
            None
        }
    }
}
