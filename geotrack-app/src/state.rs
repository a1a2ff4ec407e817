use std::sync::Arc;

use geotrack_logic::{
    AppLifecycle, DistanceSample, LocationSampler, PermissionCoordinator, PermissionError,
    PermissionKey, PermissionReport, Platform, SampleSender, StartOutcome, TaskController,
    TrackerSettings, prelude::*,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tauri::AppHandle;
use tauri_specta::Event;
use tokio::sync::RwLock;

use crate::{
    location::TauriLocation,
    permissions::{TauriPermissions, TauriSettingsPrompt},
    service::TauriForeground,
    settings::write_settings_to_store,
};

/// Location permissions changed, contains the new statuses
#[derive(Serialize, Deserialize, Clone, Debug, specta::Type, tauri_specta::Event)]
pub struct PermissionUpdate(PermissionReport);

/// A new location sample was taken
#[derive(Serialize, Deserialize, Clone, Debug, specta::Type, tauri_specta::Event)]
pub struct DistanceUpdate(DistanceSample);

pub struct TauriSampleSender(AppHandle);

impl SampleSender for TauriSampleSender {
    fn send_sample(&self, sample: &DistanceSample) {
        if let Err(why) = DistanceUpdate(sample.clone()).emit(&self.0) {
            error!("Error sending distance update to UI: {why:?}");
        }
    }
}

type Coordinator = PermissionCoordinator<TauriPermissions, TauriSettingsPrompt>;
type Controller = TaskController<TauriPermissions, TauriSettingsPrompt, TauriForeground>;
type AppSampler =
    LocationSampler<TauriLocation, TauriPermissions, TauriSettingsPrompt, TauriSampleSender>;

pub struct Tracker {
    app: AppHandle,
    coordinator: Arc<Coordinator>,
    controller: Controller,
    settings: RwLock<TrackerSettings>,
}

impl Tracker {
    pub fn new(app: AppHandle, settings: TrackerSettings) -> Self {
        let coordinator = Arc::new(PermissionCoordinator::new(
            TauriPermissions::new(app.clone()),
            TauriSettingsPrompt::new(app.clone()),
            settings.max_permission_attempts,
        ));
        let controller =
            TaskController::new(coordinator.clone(), TauriForeground::new(app.clone()));

        if let Some(platform) = Platform::current() {
            let names = PermissionKey::ALL.map(|key| key.platform_name(platform));
            info!("Tracking with permissions {names:?}");
        }

        Self {
            app,
            coordinator,
            controller,
            settings: RwLock::new(settings),
        }
    }

    fn emit_permissions(&self, report: PermissionReport) {
        if let Err(why) = PermissionUpdate(report).emit(&self.app) {
            warn!("Error emitting permission update: {why:?}");
        }
    }

    pub async fn start(&self) -> Result<StartOutcome> {
        let settings = self.settings.read().await.clone();
        let sampler = Arc::new(AppSampler::new(
            TauriLocation::new(self.app.clone()),
            self.coordinator.clone(),
            TauriSampleSender(self.app.clone()),
            settings.origin,
            settings.position_options(),
        ));
        self.controller
            .start(sampler, &settings.service_options())
            .await
    }

    pub async fn stop(&self) -> Result {
        self.controller.stop().await
    }

    pub async fn shutdown(&self) -> Result {
        self.controller.shutdown().await
    }

    pub async fn is_running(&self) -> bool {
        self.controller.is_running().await
    }

    pub async fn check_permission(&self) -> PermissionReport {
        self.coordinator.check_permission().await
    }

    pub async fn ensure_permission(&self) -> Result<PermissionReport, PermissionError> {
        let res = self.coordinator.ensure_permission().await;
        let report = match &res {
            Ok(report) => *report,
            Err(why) => *why.report(),
        };
        self.emit_permissions(report);
        res
    }

    pub async fn handle_lifecycle_change(&self, next: AppLifecycle) {
        if let Some(report) = self.coordinator.handle_lifecycle_change(next).await {
            info!("Permissions after returning from settings: {report:?}");
            self.emit_permissions(report);
        }
    }

    pub async fn get_settings(&self) -> TrackerSettings {
        self.settings.read().await.clone()
    }

    /// Save new settings, task settings apply the next time tracking starts
    pub async fn update_settings(&self, settings: TrackerSettings) -> Result {
        write_settings_to_store(&self.app, &settings)?;
        self.coordinator.set_max_attempts(settings.max_permission_attempts);
        *self.settings.write().await = settings;
        Ok(())
    }
}
