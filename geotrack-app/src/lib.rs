mod location;
mod permissions;
mod service;
mod settings;
mod state;

use geotrack_logic::{AppLifecycle, PermissionReport, StartOutcome, TrackerSettings};
use log::{LevelFilter, error, info, warn};
use tauri::{Manager, RunEvent, State, WindowEvent};
use tauri_specta::{ErrorHandlingMode, collect_commands, collect_events};

use std::result::Result as StdResult;

use crate::{
    settings::read_settings_from_store,
    state::{DistanceUpdate, PermissionUpdate, Tracker},
};

type Result<T = (), E = String> = StdResult<T, E>;

// == TRACKING COMMANDS ==

#[tauri::command]
#[specta::specta]
/// Start the background location task, does nothing if it's already running or location
/// permission hasn't been granted. Returns what happened as a [StartOutcome]
async fn start_tracking(tracker: State<'_, Tracker>) -> Result<StartOutcome> {
    tracker.start().await.map_err(|err| format!("{err:#}"))
}

#[tauri::command]
#[specta::specta]
/// Stop the background location task and its notification
async fn stop_tracking(tracker: State<'_, Tracker>) -> Result {
    tracker.stop().await.map_err(|err| format!("{err:#}"))
}

#[tauri::command]
#[specta::specta]
/// Check if the background location task is running
async fn is_tracking(tracker: State<'_, Tracker>) -> Result<bool> {
    Ok(tracker.is_running().await)
}

// == PERMISSION COMMANDS ==

#[tauri::command]
#[specta::specta]
/// Get the current location permission statuses without prompting the user
async fn check_permission(tracker: State<'_, Tracker>) -> Result<PermissionReport> {
    Ok(tracker.check_permission().await)
}

#[tauri::command]
#[specta::specta]
/// Prompt for any location permission that isn't granted yet. Errors if the user keeps
/// denying or the permission is blocked, a [PermissionUpdate] event is sent either way.
async fn ensure_permission(tracker: State<'_, Tracker>) -> Result<PermissionReport> {
    tracker
        .ensure_permission()
        .await
        .map_err(|err| err.to_string())
}

// == SETTINGS COMMANDS ==

#[tauri::command]
#[specta::specta]
/// Get the current tracker settings
async fn get_settings(tracker: State<'_, Tracker>) -> Result<TrackerSettings> {
    Ok(tracker.get_settings().await)
}

#[tauri::command]
#[specta::specta]
/// Save new tracker settings, task settings take effect the next time tracking is started
async fn update_settings(settings: TrackerSettings, tracker: State<'_, Tracker>) -> Result {
    tracker
        .update_settings(settings)
        .await
        .map_err(|err| format!("{err:#}"))
}

pub fn mk_specta() -> tauri_specta::Builder {
    tauri_specta::Builder::<tauri::Wry>::new()
        .error_handling(ErrorHandlingMode::Throw)
        .commands(collect_commands![
            start_tracking,
            stop_tracking,
            is_tracking,
            check_permission,
            ensure_permission,
            get_settings,
            update_settings,
        ])
        .events(collect_events![PermissionUpdate, DistanceUpdate])
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let builder = mk_specta();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_notification::init())
        .plugin(
            tauri_plugin_log::Builder::new()
                .level(LevelFilter::Debug)
                .build(),
        )
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_geolocation::init())
        .plugin(tauri_plugin_store::Builder::default().build())
        .invoke_handler(builder.invoke_handler())
        .on_window_event(|window, event| {
            if let WindowEvent::Focused(focused) = event {
                let next = if *focused {
                    AppLifecycle::Active
                } else {
                    AppLifecycle::Background
                };
                let handle = window.app_handle().clone();
                tauri::async_runtime::spawn(async move {
                    // Focus events can come in before setup has finished
                    if let Some(tracker) = handle.try_state::<Tracker>() {
                        tracker.handle_lifecycle_change(next).await;
                    }
                });
            }
        })
        .setup(move |app| {
            builder.mount_events(app);

            let handle = app.handle().clone();
            let settings = read_settings_from_store(&handle).unwrap_or_else(|why| {
                warn!("Using default settings: {why:?}");
                TrackerSettings::default()
            });
            app.manage(Tracker::new(handle.clone(), settings));

            tauri::async_runtime::spawn(async move {
                let tracker = handle.state::<Tracker>();
                match tracker.ensure_permission().await {
                    Ok(report) => info!("Location permission ready: {report:?}"),
                    Err(why) => error!("Location permission missing: {why}"),
                }
            });
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|handle, event| {
            if let RunEvent::Exit = event
                && let Some(tracker) = handle.try_state::<Tracker>()
                && let Err(why) = tauri::async_runtime::block_on(tracker.shutdown())
            {
                error!("Error stopping tracking on exit: {why:#}");
            }
        });
}
