use anyhow::anyhow;
use geotrack_logic::{TrackerSettings, prelude::*};
use tauri::AppHandle;
use tauri_plugin_store::StoreExt;

const STORE_NAME: &str = "settings";
const SETTINGS_KEY: &str = "settings";

/// Read saved settings, falls back to the defaults when nothing was saved yet
pub fn read_settings_from_store(app: &AppHandle) -> Result<TrackerSettings> {
    let store = app
        .store(STORE_NAME)
        .map_err(|why| anyhow!("Couldn't open settings store: {why}"))?;

    let settings = store
        .get(SETTINGS_KEY)
        .map(serde_json::from_value::<TrackerSettings>)
        .transpose()
        .context("Saved settings are invalid");

    store.close_resource();

    Ok(settings?.unwrap_or_default())
}

pub fn write_settings_to_store(app: &AppHandle, settings: &TrackerSettings) -> Result {
    let store = app
        .store(STORE_NAME)
        .map_err(|why| anyhow!("Couldn't open settings store: {why}"))?;

    let value = serde_json::to_value(settings).context("Failed to serialize settings")?;
    store.set(SETTINGS_KEY, value);
    Ok(())
}
