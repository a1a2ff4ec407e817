use std::sync::atomic::{AtomicI32, Ordering};

use anyhow::anyhow;
use geotrack_logic::{ForegroundService, ServiceNotification, prelude::*};
use log::{debug, info};
use tauri::AppHandle;
use tauri_plugin_notification::NotificationExt;

/// Keeps an ongoing notification up while tracking
pub struct TauriForeground {
    app: AppHandle,
    /// Id of the notification currently shown, 0 when none
    shown: AtomicI32,
}

impl TauriForeground {
    pub fn new(app: AppHandle) -> Self {
        Self {
            app,
            shown: AtomicI32::new(0),
        }
    }
}

impl ForegroundService for TauriForeground {
    async fn start(&self, notification: &ServiceNotification) -> Result {
        self.app
            .notification()
            .builder()
            .id(notification.id)
            .title(&notification.title)
            .body(&notification.message)
            .ongoing()
            .show()
            .map_err(|why| anyhow!("Failed to show service notification: {why}"))?;

        self.shown.store(notification.id, Ordering::SeqCst);
        info!("Foreground service started");
        Ok(())
    }

    async fn stop(&self) -> Result {
        let id = self.shown.swap(0, Ordering::SeqCst);
        if id == 0 {
            debug!("Foreground service wasn't running");
            return Ok(());
        }

        #[cfg(mobile)]
        self.app
            .notification()
            .cancel(vec![id])
            .map_err(|why| anyhow!("Failed to remove service notification: {why}"))?;

        info!("Foreground service stopped");
        Ok(())
    }
}
