//! Background task registry.
//!
//! # Responsibilities
//! - Hold the helpers declared when the client is built
//! - Hand each of them the scheduler at startup
//! - Stop them on shutdown through whichever teardown they support
//!
//! # Design Decisions
//! - The set of tasks is fixed at construction; the registry only reads it
//! - Helpers declare their teardown capability instead of being probed
//! - `shutdown` is preferred over `stop_recurring`; helpers with neither are
//!   left alone by the sweep

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::lifecycle::Shutdown;

/// Teardown a background task supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Permanent stop via [`BackgroundTask::shutdown`].
    Shutdown,
    /// Stop repeating work via [`BackgroundTask::stop_recurring`].
    StopRecurring,
    /// Not part of the shutdown sweep.
    None,
}

/// Long-lived helper that runs next to the client.
pub trait BackgroundTask: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Receive the scheduler the helper should spawn on.
    fn set_scheduler(&self, scheduler: Handle);

    /// Teardown this task supports. Defaults to none.
    fn teardown(&self) -> Teardown {
        Teardown::None
    }

    /// Stop the task for good.
    fn shutdown(&self) {}

    /// Stop repeating work.
    fn stop_recurring(&self) {}
}

/// Fixed set of background tasks.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tasks: Arc<Vec<Arc<dyn BackgroundTask>>>,
}

impl BackgroundTasks {
    /// Fix the set of tasks.
    pub fn new(tasks: Vec<Arc<dyn BackgroundTask>>) -> Self {
        Self {
            tasks: Arc::new(tasks),
        }
    }

    /// Hand the scheduler to every task.
    pub fn start(&self, scheduler: &Handle) {
        for task in self.tasks.iter() {
            tracing::debug!(task = task.name(), "Starting background task");
            task.set_scheduler(scheduler.clone());
        }
    }

    /// Stop every task that supports a teardown. Returns how many were asked.
    pub fn shutdown_all(&self) -> usize {
        let mut stopped = 0;

        for task in self.tasks.iter() {
            match task.teardown() {
                Teardown::Shutdown => task.shutdown(),
                Teardown::StopRecurring => task.stop_recurring(),
                Teardown::None => continue,
            }
            tracing::debug!(task = task.name(), "Stopped background task");
            stopped += 1;
        }

        stopped
    }

    /// Task names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.tasks.iter().map(|task| task.name().to_string()).collect()
    }

    /// Number of declared tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if no tasks were declared.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl std::fmt::Debug for BackgroundTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Background task that runs a job at a fixed period.
///
/// `stop_recurring` stops the loop until the next `set_scheduler`;
/// `shutdown` stops it for good.
pub struct PeriodicTask {
    name: String,
    period: Duration,
    job: Arc<dyn Fn() + Send + Sync>,
    shutdown: Shutdown,
    running: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTask {
    /// Create a task running `job` every `period` once it has a scheduler.
    pub fn new<F>(name: impl Into<String>, period: Duration, job: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            period: period.max(Duration::from_millis(1)),
            job: Arc::new(job),
            shutdown: Shutdown::new(),
            running: Mutex::new(None),
        }
    }

    /// Check if the loop is currently scheduled.
    pub fn is_running(&self) -> bool {
        self.running()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn running(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BackgroundTask for PeriodicTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_scheduler(&self, scheduler: Handle) {
        if self.shutdown.is_triggered() {
            tracing::debug!(task = %self.name, "Background task already shut down");
            return;
        }

        let mut shutdown = self.shutdown.subscribe();
        let job = Arc::clone(&self.job);
        let period = self.period;
        let name = self.name.clone();

        let task = scheduler.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => job(),
                    _ = shutdown.recv() => {
                        tracing::info!(task = %name, "Background task received shutdown signal");
                        break;
                    }
                }
            }
        });

        if let Some(previous) = self.running().replace(task) {
            previous.abort();
        }
    }

    fn teardown(&self) -> Teardown {
        Teardown::Shutdown
    }

    fn shutdown(&self) {
        self.shutdown.trigger();
        self.running().take();
    }

    fn stop_recurring(&self) {
        if let Some(task) = self.running().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("period", &self.period)
            .finish()
    }
}
