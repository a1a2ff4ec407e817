use std::{sync::Arc, time::Duration};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    permission::{PermissionBackend, PermissionCoordinator, SettingsPrompt},
    prelude::*,
    scheduler::{Sampler, TaskOptions, TaskScheduler},
};

/// Id of the location sampling task, only one may exist at a time
pub const TASK_ID: &str = "taskid";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// The persistent notification shown while the service runs
pub struct ServiceNotification {
    pub id: i32,
    pub title: String,
    pub message: String,
}

impl Default for ServiceNotification {
    fn default() -> Self {
        Self {
            id: 144,
            title: "Foreground Service".to_string(),
            message: "you are online!".to_string(),
        }
    }
}

/// Keeps the app alive in the background while a task runs
pub trait ForegroundService: Send + Sync {
    /// Start the service and show its notification
    fn start(&self, notification: &ServiceNotification) -> impl Future<Output = Result> + Send;
    /// Stop the service and remove its notification, should be fine to call when not started
    fn stop(&self) -> impl Future<Output = Result> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Time between samples
    pub delay: Duration,
    pub notification: ServiceNotification,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            delay: TaskOptions::default().delay,
            notification: ServiceNotification::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, specta::Type)]
pub enum StartOutcome {
    /// The task was registered and the service started
    Started,
    /// The task was already running, nothing changed
    AlreadyRunning,
    /// Neither location permission is granted, nothing was started
    PermissionMissing,
}

/// Starts and stops the location task along with the foreground service that keeps it alive
pub struct TaskController<P: PermissionBackend, D: SettingsPrompt, F: ForegroundService> {
    coordinator: Arc<PermissionCoordinator<P, D>>,
    foreground: F,
    scheduler: TaskScheduler,
    lifecycle_lock: Mutex<()>,
}

impl<P: PermissionBackend, D: SettingsPrompt, F: ForegroundService> TaskController<P, D, F> {
    pub fn new(coordinator: Arc<PermissionCoordinator<P, D>>, foreground: F) -> Self {
        Self {
            coordinator,
            foreground,
            scheduler: TaskScheduler::new(),
            lifecycle_lock: Mutex::new(()),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.is_task_running(TASK_ID).await
    }

    /// Start sampling with `sampler` every `options.delay`. Does nothing if the task is already
    /// running or no location permission is granted.
    pub async fn start<S: Sampler>(
        &self,
        sampler: Arc<S>,
        options: &ServiceOptions,
    ) -> Result<StartOutcome> {
        let _guard = self.lifecycle_lock.lock().await;

        if self.is_running().await {
            debug!("Task {TASK_ID} is already running, not starting again");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let permissions = self.coordinator.check_permission().await;
        if !permissions.any_granted() {
            debug!("No location permission granted ({permissions:?}), not starting");
            return Ok(StartOutcome::PermissionMissing);
        }

        info!("permission granted");

        let task_options = TaskOptions {
            delay: options.delay,
            on_loop: true,
        };
        if !self.scheduler.add_task(TASK_ID, task_options, sampler).await {
            return Ok(StartOutcome::AlreadyRunning);
        }

        if let Err(why) = self.foreground.start(&options.notification).await {
            self.scheduler.remove_task(TASK_ID).await;
            return Err(why.context("Failed to start foreground service"));
        }

        Ok(StartOutcome::Started)
    }

    /// Remove the task if it's running, then stop the foreground service
    /// Remove the task if it's running, then stop the foreground service. Waits for an
    /// in-progress [Self::start] so a start can't outlive the stop that followed it.
    pub async fn stop(&self) -> Result {
        let _guard = self.lifecycle_lock.lock().await;
        if self.scheduler.remove_task(TASK_ID).await {
            info!("Removed task {TASK_ID}");
        }
        self.stop_service().await
    }

    /// Cancel every scheduled task and stop the foreground service, for app teardown
    pub async fn shutdown(&self) -> Result {
        let _guard = self.lifecycle_lock.lock().await;
        self.scheduler.stop_all().await;
        self.stop_service().await
    }

    async fn stop_service(&self) -> Result {
        self.foreground
            .stop()
            .await
            .context("Failed to stop foreground service")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        PermissionStatus::*,
        tests::{CountingSampler, MockForeground, MockPermissions, MockPrompt},
    };
    use tokio::time::sleep;

    type TestController = TaskController<MockPermissions, MockPrompt, MockForeground>;

    fn controller(perms: &MockPermissions, foreground: &MockForeground) -> TestController {
        let coordinator = Arc::new(PermissionCoordinator::new(
            perms.clone(),
            MockPrompt::new(false),
            3,
        ));
        TaskController::new(coordinator, foreground.clone())
    }

    fn options() -> ServiceOptions {
        ServiceOptions {
            delay: Duration::from_millis(500),
            notification: ServiceNotification::default(),
        }
    }

    #[tokio::test]
    async fn start_registers_task_and_service() {
        tokio::time::pause();
        let perms = MockPermissions::new(Granted, Granted);
        let foreground = MockForeground::default();
        let controller = controller(&perms, &foreground);
        let sampler = Arc::new(CountingSampler::default());

        let outcome = controller.start(sampler.clone(), &options()).await.unwrap();
        assert_eq!(outcome, StartOutcome::Started);
        assert!(controller.is_running().await);
        assert_eq!(foreground.starts(), 1);
        assert_eq!(
            foreground.last_notification(),
            Some(ServiceNotification::default())
        );

        sleep(Duration::from_millis(1250)).await;
        assert_eq!(sampler.started(), 3);
    }

    #[tokio::test]
    async fn double_start_registers_one_task() {
        tokio::time::pause();
        let perms = MockPermissions::new(Granted, Denied);
        let foreground = MockForeground::default();
        let controller = controller(&perms, &foreground);
        let first = Arc::new(CountingSampler::default());
        let second = Arc::new(CountingSampler::default());

        let a = controller.start(first.clone(), &options()).await.unwrap();
        let b = controller.start(second.clone(), &options()).await.unwrap();
        assert_eq!(a, StartOutcome::Started);
        assert_eq!(b, StartOutcome::AlreadyRunning);
        assert_eq!(foreground.starts(), 1);

        sleep(Duration::from_millis(1250)).await;
        assert_eq!(first.started(), 3);
        assert_eq!(second.started(), 0);
    }

    #[tokio::test]
    async fn concurrent_starts_register_one_task() {
        tokio::time::pause();
        let perms = MockPermissions::new(Granted, Granted);
        let foreground = MockForeground::default();
        let controller = controller(&perms, &foreground);
        let sampler = Arc::new(CountingSampler::default());

        let opts = options();
        let (a, b) = tokio::join!(
            controller.start(sampler.clone(), &opts),
            controller.start(sampler.clone(), &opts),
        );
        let mut outcomes = vec![a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|o| *o != StartOutcome::Started);
        assert_eq!(
            outcomes,
            vec![StartOutcome::Started, StartOutcome::AlreadyRunning]
        );
        assert_eq!(foreground.starts(), 1);
    }

    #[tokio::test]
    async fn no_permission_starts_nothing() {
        tokio::time::pause();
        let perms = MockPermissions::new(Denied, Blocked);
        let foreground = MockForeground::default();
        let controller = controller(&perms, &foreground);
        let sampler = Arc::new(CountingSampler::default());

        let outcome = controller.start(sampler.clone(), &options()).await.unwrap();
        assert_eq!(outcome, StartOutcome::PermissionMissing);
        assert!(!controller.is_running().await);
        assert_eq!(foreground.starts(), 0);
        assert_eq!(perms.request_calls(), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(sampler.started(), 0);
    }

    #[tokio::test]
    async fn stop_removes_task_then_service() {
        tokio::time::pause();
        let perms = MockPermissions::new(Granted, Granted);
        let foreground = MockForeground::default();
        let controller = controller(&perms, &foreground);
        let sampler = Arc::new(CountingSampler::default());

        controller.start(sampler.clone(), &options()).await.unwrap();
        sleep(Duration::from_millis(750)).await;
        controller.stop().await.unwrap();
        assert!(!controller.is_running().await);
        assert_eq!(foreground.stops(), 1);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(sampler.started(), 2);

        // Can start again after stopping
        let outcome = controller.start(sampler.clone(), &options()).await.unwrap();
        assert_eq!(outcome, StartOutcome::Started);
    }

    #[tokio::test]
    async fn stop_when_idle_is_harmless() {
        let perms = MockPermissions::new(Granted, Granted);
        let foreground = MockForeground::default();
        let controller = controller(&perms, &foreground);

        controller.stop().await.unwrap();
        controller.stop().await.unwrap();
        assert!(!controller.is_running().await);
        assert_eq!(foreground.starts(), 0);
        assert_eq!(foreground.stops(), 2);
    }

    #[tokio::test]
    async fn stop_during_start_wins() {
        tokio::time::pause();
        let perms = MockPermissions::new(Granted, Granted);
        perms.delay_checks(Duration::from_millis(50));
        let foreground = MockForeground::default();
        let controller = controller(&perms, &foreground);
        let sampler = Arc::new(CountingSampler::default());

        let opts = options();
        let (started, stopped) = tokio::join!(controller.start(sampler.clone(), &opts), async {
            sleep(Duration::from_millis(10)).await;
            controller.stop().await
        });
        assert_eq!(started.unwrap(), StartOutcome::Started);
        stopped.unwrap();

        assert!(!controller.is_running().await);
        assert_eq!(foreground.starts(), 1);
        assert_eq!(foreground.stops(), 1);

        let ticks = sampler.started();
        sleep(Duration::from_secs(3)).await;
        assert_eq!(sampler.started(), ticks);
    }

    #[tokio::test]
    async fn shutdown_stops_task_and_service() {
        tokio::time::pause();
        let perms = MockPermissions::new(Granted, Granted);
        let foreground = MockForeground::default();
        let controller = controller(&perms, &foreground);
        let sampler = Arc::new(CountingSampler::default());

        controller.start(sampler.clone(), &options()).await.unwrap();
        sleep(Duration::from_millis(100)).await;
        controller.shutdown().await.unwrap();
        sleep(Duration::from_secs(2)).await;

        assert!(!controller.is_running().await);
        assert_eq!(sampler.started(), 1);
        assert_eq!(foreground.stops(), 1);
    }

    #[tokio::test]
    async fn failed_service_start_rolls_back_task() {
        tokio::time::pause();
        let perms = MockPermissions::new(Granted, Granted);
        let foreground = MockForeground::failing();
        let controller = controller(&perms, &foreground);
        let sampler = Arc::new(CountingSampler::default());

        assert!(controller.start(sampler.clone(), &options()).await.is_err());
        assert!(!controller.is_running().await);
    }
}
