use geotrack_logic::{GeoPoint, LocationError, LocationService, PositionOptions};
use log::warn;
use tauri::{AppHandle, plugin::PermissionState};
use tauri_plugin_geolocation::{GeolocationExt, PositionOptions as PluginPositionOptions};

pub struct TauriLocation(AppHandle);

impl TauriLocation {
    pub fn new(app: AppHandle) -> Self {
        Self(app)
    }
}

fn plugin_options(options: &PositionOptions) -> PluginPositionOptions {
    PluginPositionOptions {
        enable_high_accuracy: options.high_accuracy,
        timeout: 10000,
        // Always a fresh fix, never a cached one
        maximum_age: 0,
    }
}

fn read_position(app: &AppHandle, options: &PositionOptions) -> Result<GeoPoint, LocationError> {
    let geolocation = app.geolocation();
    match geolocation.get_current_position(Some(plugin_options(options))) {
        Ok(pos) => Ok(GeoPoint::new(pos.coords.latitude, pos.coords.longitude)),
        Err(why) => {
            // The plugin doesn't tell us why, so ask whether we're still allowed
            let denied = geolocation
                .check_permissions()
                .map(|status| !matches!(status.location, PermissionState::Granted))
                .unwrap_or(false);

            if denied {
                Err(LocationError::PermissionDenied)
            } else {
                Err(LocationError::Other(why.to_string()))
            }
        }
    }
}

impl LocationService for TauriLocation {
    async fn current_position(&self, options: &PositionOptions) -> Result<GeoPoint, LocationError> {
        let app = self.0.clone();
        let options = options.clone();
        tauri::async_runtime::spawn_blocking(move || read_position(&app, &options))
            .await
            .unwrap_or_else(|why| {
                warn!("Location task failed: {why:?}");
                Err(LocationError::PositionUnavailable)
            })
    }
}
