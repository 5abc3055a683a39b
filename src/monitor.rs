//! Lifecycle controller.
//!
//! [`Monitor`] owns a small tokio runtime that hosts the supervisor task and
//! offers a blocking API on top of it, so it can be driven from `main`, from
//! exit handlers and from plain `#[test]` functions alike. Methods that wait
//! ([`Monitor::stop`] and dropping the monitor while it runs) must not be
//! called from inside an async context.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::command::{CommandSpec, DEFAULT_COMMAND, MAX_ARGUMENTS};
use crate::error::CollectorError;
use crate::reader::{SampleReader, DEFAULT_STALE_THRESHOLD_SECS};
use crate::sample::{Sample, SampleStore};
use crate::stats::SupervisorStats;
use crate::supervisor::{
    Supervisor, SupervisorControl, SupervisorExit, SupervisorPhase, SupervisorSettings,
};

/// Upper bound on how long `stop()` waits before aborting the task.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to build a [`Monitor`].
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub command: String,
    pub max_arguments: usize,
    pub supervisor: SupervisorSettings,
    pub stale_threshold_secs: i64,
    pub stop_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            max_arguments: MAX_ARGUMENTS,
            supervisor: SupervisorSettings::default(),
            stale_threshold_secs: DEFAULT_STALE_THRESHOLD_SECS,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

struct ActiveRun {
    control: Arc<SupervisorControl>,
    task: JoinHandle<SupervisorExit>,
}

/// Starts and stops the background sampler and hands out samples.
pub struct Monitor {
    runtime: Runtime,
    command: CommandSpec,
    settings: SupervisorSettings,
    stop_timeout: Duration,
    store: Arc<SampleStore>,
    stats: Arc<SupervisorStats>,
    reader: SampleReader,
    active: Mutex<Option<ActiveRun>>,
}

impl Monitor {
    pub fn new(settings: MonitorSettings) -> Result<Self, CollectorError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .thread_name("gpu-sampler")
            .build()
            .map_err(CollectorError::Runtime)?;

        let store = Arc::new(SampleStore::new());
        let reader = SampleReader::new(Arc::clone(&store), settings.stale_threshold_secs);

        Ok(Self {
            runtime,
            command: CommandSpec::with_max_arguments(settings.command, settings.max_arguments),
            settings: settings.supervisor,
            stop_timeout: settings.stop_timeout,
            store,
            stats: Arc::new(SupervisorStats::new()),
            reader,
            active: Mutex::new(None),
        })
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Launches the supervisor. Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let mut active = self.lock_active();

        if let Some(run) = active.as_ref() {
            if !run.task.is_finished() {
                debug!("Sampler already running");
                return false;
            }
        }
        if let Some(run) = active.take() {
            self.collect(run.task);
        }

        let supervisor = Supervisor::new(
            self.command.clone(),
            self.settings.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.stats),
        );
        let control = supervisor.control();
        let task = self.runtime.spawn(supervisor.run());
        *active = Some(ActiveRun { control, task });

        info!("Sampler started with '{}'", self.command.get());
        true
    }

    /// Stops the supervisor and waits until no tool process is left.
    ///
    /// Idempotent, and a no-op before the first `start()`. A concurrent
    /// second caller waits for the first one to finish.
    pub fn stop(&self) {
        let mut active = self.lock_active();
        let Some(ActiveRun { control, mut task }) = active.take() else {
            debug!("Sampler not running, nothing to stop");
            return;
        };

        control.request_stop();

        let result = self
            .runtime
            .block_on(async { tokio::time::timeout(self.stop_timeout, &mut task).await });

        match result {
            Ok(Ok(exit)) => info!("Sampler stopped ({:?})", exit),
            Ok(Err(e)) => error!("Sampler task failed: {}", e),
            Err(_) => {
                warn!(
                    "Sampler did not stop within {}s, aborting",
                    self.stop_timeout.as_secs_f64()
                );
                task.abort();
                if let Err(e) = self.runtime.block_on(&mut task) {
                    debug!("Aborted sampler task: {}", e);
                }
            }
        }
    }

    fn collect(&self, task: JoinHandle<SupervisorExit>) -> Option<SupervisorExit> {
        match self.runtime.block_on(task) {
            Ok(exit) => {
                debug!("Collected finished sampler run: {:?}", exit);
                Some(exit)
            }
            Err(e) => {
                error!("Sampler task failed: {}", e);
                None
            }
        }
    }

    /// Takes the exit status of a run that ended on its own, such as after a
    /// failed launch. Returns `None` while running or when never started.
    pub fn take_exit(&self) -> Option<SupervisorExit> {
        let mut active = self.lock_active();
        if !active.as_ref().is_some_and(|run| run.task.is_finished()) {
            return None;
        }
        let run = active.take()?;
        self.collect(run.task)
    }

    pub fn is_running(&self) -> bool {
        self.lock_active()
            .as_ref()
            .is_some_and(|run| !run.task.is_finished())
    }

    pub fn phase(&self) -> SupervisorPhase {
        self.lock_active()
            .as_ref()
            .map(|run| run.control.phase())
            .unwrap_or(SupervisorPhase::Idle)
    }

    /// Pid of the tool process currently being read, if any.
    pub fn child_pid(&self) -> Option<u32> {
        self.lock_active()
            .as_ref()
            .and_then(|run| run.control.child_pid())
    }

    pub fn command(&self) -> String {
        self.command.get()
    }

    /// Replaces the command used from the next launch on.
    pub fn set_command(&self, command: impl Into<String>) {
        self.command.set(command);
    }

    /// Replaces the command and, if running, relaunches the tool right away.
    pub fn apply_command(&self, command: impl Into<String>) {
        self.command.set(command);
        if let Some(run) = self.lock_active().as_ref() {
            info!("Command changed, restarting tool");
            run.control.request_restart();
        }
    }

    /// Latest sample, or the sentinel if it is stale.
    pub fn poll(&self) -> Arc<Sample> {
        self.reader.poll_now()
    }

    /// [`poll`](Self::poll) against an explicit unix time.
    pub fn poll_at(&self, now: i64) -> Arc<Sample> {
        self.reader.poll(now)
    }

    pub fn reader(&self) -> SampleReader {
        self.reader.clone()
    }

    pub fn store(&self) -> Arc<SampleStore> {
        Arc::clone(&self.store)
    }

    pub fn stats(&self) -> Arc<SupervisorStats> {
        Arc::clone(&self.stats)
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_before_start() {
        let monitor = Monitor::new(MonitorSettings::default()).unwrap();
        monitor.stop();
        monitor.stop();
        assert!(!monitor.is_running());
        assert_eq!(monitor.phase(), SupervisorPhase::Idle);
        assert!(monitor.take_exit().is_none());
    }

    #[test]
    fn test_poll_before_start_is_sentinel() {
        let monitor = Monitor::new(MonitorSettings::default()).unwrap();
        assert!(monitor.poll().is_empty());
    }

    #[test]
    fn test_set_command_is_visible() {
        let monitor = Monitor::new(MonitorSettings::default()).unwrap();
        assert_eq!(monitor.command(), DEFAULT_COMMAND);
        monitor.set_command("radeontop -d - -i 2");
        assert_eq!(monitor.command(), "radeontop -d - -i 2");
        // Not running: nothing to restart.
        monitor.apply_command("radeontop -d -");
        assert_eq!(monitor.command(), "radeontop -d -");
        assert!(!monitor.is_running());
    }
}
