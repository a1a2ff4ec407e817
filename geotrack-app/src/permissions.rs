use anyhow::{anyhow, bail};
use geotrack_logic::{PermissionBackend, PermissionKey, PermissionStatus, SettingsPrompt, prelude::*};
use log::debug;
use tauri::{AppHandle, plugin::PermissionState};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons};
use tauri_plugin_geolocation::{GeolocationExt, PermissionType};
use tauri_plugin_opener::OpenerExt;
use tokio::sync::oneshot;

/// Location permissions as reported by the geolocation plugin
pub struct TauriPermissions(AppHandle);

impl TauriPermissions {
    pub fn new(app: AppHandle) -> Self {
        Self(app)
    }
}

#[allow(unreachable_patterns)]
fn map_state(state: PermissionState) -> PermissionStatus {
    match state {
        PermissionState::Granted => PermissionStatus::Granted,
        PermissionState::Prompt | PermissionState::PromptWithRationale => PermissionStatus::Denied,
        // The plugin only reports denied once the OS stops showing the prompt
        PermissionState::Denied => PermissionStatus::Blocked,
        _ => PermissionStatus::Unavailable,
    }
}

const fn plugin_type(key: PermissionKey) -> PermissionType {
    match key {
        PermissionKey::Location => PermissionType::Location,
        PermissionKey::BackgroundLocation => PermissionType::CoarseLocation,
    }
}

fn select(
    key: PermissionKey,
    status: tauri_plugin_geolocation::PermissionStatus,
) -> PermissionStatus {
    match key {
        PermissionKey::Location => map_state(status.location),
        PermissionKey::BackgroundLocation => map_state(status.coarse_location),
    }
}

impl PermissionBackend for TauriPermissions {
    async fn check(&self, key: PermissionKey) -> Result<PermissionStatus> {
        let app = self.0.clone();
        let status = tauri::async_runtime::spawn_blocking(move || {
            app.geolocation().check_permissions()
        })
        .await
        .context("Permission check task failed")?
        .map_err(|why| anyhow!("Failed to check permissions: {why}"))?;

        Ok(select(key, status))
    }

    async fn request(&self, key: PermissionKey) -> Result<PermissionStatus> {
        let app = self.0.clone();
        let status = tauri::async_runtime::spawn_blocking(move || {
            app.geolocation()
                .request_permissions(Some(vec![plugin_type(key)]))
        })
        .await
        .context("Permission request task failed")?
        .map_err(|why| anyhow!("Failed to request permissions: {why}"))?;

        Ok(select(key, status))
    }
}

#[cfg(target_os = "ios")]
const SETTINGS_URL: Option<&str> = Some("app-settings:");
#[cfg(not(target_os = "ios"))]
const SETTINGS_URL: Option<&str> = None;

/// Asks with a native dialog, then opens the system settings page for the app
pub struct TauriSettingsPrompt(AppHandle);

impl TauriSettingsPrompt {
    pub fn new(app: AppHandle) -> Self {
        Self(app)
    }
}

impl SettingsPrompt for TauriSettingsPrompt {
    async fn confirm_open_settings(&self, title: &str, message: &str) -> bool {
        let (tx, rx) = oneshot::channel();
        self.0
            .dialog()
            .message(message)
            .title(title)
            .buttons(MessageDialogButtons::OkCancelCustom(
                "Set Setting".to_string(),
                "Cancel".to_string(),
            ))
            .show(move |open| {
                tx.send(open).ok();
            });

        rx.await.unwrap_or(false)
    }

    async fn open_settings(&self) -> Result {
        let Some(url) = SETTINGS_URL else {
            bail!("Opening system settings isn't supported on this platform");
        };
        debug!("Opening {url}");
        self.0
            .opener()
            .open_url(url, None::<&str>)
            .map_err(|why| anyhow!("Failed to open settings: {why}"))
    }
}
