use std::{collections::HashMap, sync::Arc, time::Duration};

use log::{debug, error};
use tokio::{sync::Mutex, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::prelude::*;

pub type TaskId = String;

/// A unit of work the scheduler runs on every tick
pub trait Sampler: Send + Sync + 'static {
    fn sample(&self) -> impl Future<Output = Result> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOptions {
    /// Time between the start of each tick
    pub delay: Duration,
    /// Keep running until removed, otherwise run once
    pub on_loop: bool,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            on_loop: true,
        }
    }
}

struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningTask {
    fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

/// Keeps track of named repeating tasks, at most one per id.
#[derive(Default)]
pub struct TaskScheduler {
    tasks: Mutex<HashMap<TaskId, RunningTask>>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    async fn task_loop<S: Sampler>(
        id: TaskId,
        options: TaskOptions,
        task: Arc<S>,
        cancel: CancellationToken,
    ) {
        // tokio panics on a zero period
        let mut interval = tokio::time::interval(options.delay.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    break;
                }

                _ = interval.tick() => {}
            }

            // Not raced against the token, a tick that started always runs to completion
            if let Err(why) = task.sample().await {
                error!("Error logging: {why:?}");
            }

            if !options.on_loop {
                break;
            }
        }

        debug!("Task {id} finished");
    }

    /// Register and start a task. Returns false without doing anything if a task with
    /// the same id is still running.
    pub async fn add_task<S: Sampler>(
        &self,
        id: impl Into<TaskId>,
        options: TaskOptions,
        task: Arc<S>,
    ) -> bool {
        let id = id.into();
        let mut tasks = self.tasks.lock().await;

        if tasks.get(&id).is_some_and(RunningTask::is_running) {
            debug!("Task {id} is already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Self::task_loop(id.clone(), options, task, cancel.clone()));
        tasks.insert(id, RunningTask { cancel, handle });

        true
    }

    /// Stop a task, a tick that's currently running will still finish.
    /// Returns whether the task was running.
    pub async fn remove_task(&self, id: &str) -> bool {
        let removed = self.tasks.lock().await.remove(id);
        match removed {
            Some(task) => {
                let running = task.is_running();
                task.cancel.cancel();
                running
            }
            None => false,
        }
    }

    pub async fn is_task_running(&self, id: &str) -> bool {
        self.tasks
            .lock()
            .await
            .get(id)
            .is_some_and(RunningTask::is_running)
    }

    pub async fn stop_all(&self) {
        for (id, task) in self.tasks.lock().await.drain() {
            debug!("Stopping task {id}");
            task.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::CountingSampler;
    use tokio::time::sleep;

    const DELAY: Duration = Duration::from_millis(500);

    fn looping() -> TaskOptions {
        TaskOptions {
            delay: DELAY,
            on_loop: true,
        }
    }

    #[tokio::test]
    async fn ticks_at_fixed_delay() {
        tokio::time::pause();
        let scheduler = TaskScheduler::new();
        let sampler = Arc::new(CountingSampler::default());

        assert!(scheduler.add_task("a", looping(), sampler.clone()).await);
        sleep(Duration::from_millis(1250)).await;

        // 0ms, 500ms, 1000ms
        assert_eq!(sampler.started(), 3);
        assert!(scheduler.is_task_running("a").await);
    }

    #[tokio::test]
    async fn duplicate_id_is_refused() {
        tokio::time::pause();
        let scheduler = TaskScheduler::new();
        let first = Arc::new(CountingSampler::default());
        let second = Arc::new(CountingSampler::default());

        assert!(scheduler.add_task("a", looping(), first.clone()).await);
        assert!(!scheduler.add_task("a", looping(), second.clone()).await);
        sleep(Duration::from_millis(1250)).await;

        assert_eq!(first.started(), 3);
        assert_eq!(second.started(), 0);
    }

    #[tokio::test]
    async fn remove_stops_ticks() {
        tokio::time::pause();
        let scheduler = TaskScheduler::new();
        let sampler = Arc::new(CountingSampler::default());

        scheduler.add_task("a", looping(), sampler.clone()).await;
        sleep(Duration::from_millis(750)).await;
        assert!(scheduler.remove_task("a").await);
        sleep(Duration::from_secs(5)).await;

        assert_eq!(sampler.started(), 2);
        assert!(!scheduler.is_task_running("a").await);
        assert!(!scheduler.remove_task("a").await);
    }

    #[tokio::test]
    async fn in_flight_tick_completes_after_remove() {
        tokio::time::pause();
        let scheduler = TaskScheduler::new();
        let sampler = Arc::new(CountingSampler::with_work(Duration::from_millis(300)));

        scheduler.add_task("a", looping(), sampler.clone()).await;
        sleep(Duration::from_millis(100)).await;
        assert_eq!(sampler.started(), 1);
        assert_eq!(sampler.finished(), 0);

        scheduler.remove_task("a").await;
        sleep(Duration::from_secs(2)).await;

        assert_eq!(sampler.started(), 1);
        assert_eq!(sampler.finished(), 1);
    }

    #[tokio::test]
    async fn slow_ticks_do_not_overlap() {
        tokio::time::pause();
        let scheduler = TaskScheduler::new();
        let sampler = Arc::new(CountingSampler::with_work(Duration::from_millis(800)));

        scheduler.add_task("a", looping(), sampler.clone()).await;
        sleep(Duration::from_millis(2000)).await;

        assert_eq!(sampler.max_concurrent(), 1);
        assert!(sampler.started() <= 3);
    }

    #[tokio::test]
    async fn errors_keep_the_loop_going() {
        tokio::time::pause();
        let scheduler = TaskScheduler::new();
        let sampler = Arc::new(CountingSampler::failing());

        scheduler.add_task("a", looping(), sampler.clone()).await;
        sleep(Duration::from_millis(1250)).await;

        assert_eq!(sampler.started(), 3);
        assert!(scheduler.is_task_running("a").await);
    }

    #[tokio::test]
    async fn one_shot_runs_once_and_can_be_re_added() {
        tokio::time::pause();
        let scheduler = TaskScheduler::new();
        let sampler = Arc::new(CountingSampler::default());
        let once = TaskOptions {
            delay: DELAY,
            on_loop: false,
        };

        scheduler.add_task("a", once, sampler.clone()).await;
        sleep(Duration::from_secs(2)).await;
        assert_eq!(sampler.started(), 1);
        assert!(!scheduler.is_task_running("a").await);

        assert!(scheduler.add_task("a", once, sampler.clone()).await);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(sampler.started(), 2);
    }

    #[tokio::test]
    async fn stop_all_cancels_everything() {
        tokio::time::pause();
        let scheduler = TaskScheduler::new();
        let a = Arc::new(CountingSampler::default());
        let b = Arc::new(CountingSampler::default());

        scheduler.add_task("a", looping(), a.clone()).await;
        scheduler.add_task("b", looping(), b.clone()).await;
        sleep(Duration::from_millis(100)).await;
        scheduler.stop_all().await;
        sleep(Duration::from_secs(2)).await;

        assert_eq!(a.started(), 1);
        assert_eq!(b.started(), 1);
        assert!(!scheduler.is_task_running("a").await);
    }
}
