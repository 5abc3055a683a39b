//! Supervision of the external stats tool.
//!
//! The supervisor launches the configured command, discards its first output
//! line (a banner), parses every further line into a [`Sample`] and restarts
//! the tool after a fixed delay whenever its output ends:
//!
//! ```text
//! Idle -> Launching -> Streaming -> Exited -> Restarting -> Launching ...
//!                                         \-> Stopped
//! ```
//!
//! Stop and restart requests go through [`SupervisorControl`]. Its single
//! lock guards the request flags and the child handle together, so a stop can
//! never slip in between "tool exited" and "new tool recorded": a launch
//! re-checks the stop flag under the same lock that stores the new child.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::Notify;
use tracing::{debug, error, info, instrument, warn};

use crate::command::CommandSpec;
use crate::error::CollectorError;
use crate::parser::{default_fields, parse_line, FieldSpec};
use crate::sample::{Sample, SampleStore};
use crate::stats::SupervisorStats;

/// Delay between the end of one tool run and the next launch.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(5);

/// How long an exited tool gets to be reaped before it is killed.
pub const REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest output line kept for parsing; longer lines are skipped.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Where the supervisor currently is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorPhase {
    #[default]
    Idle,
    Launching,
    Streaming,
    Exited,
    Restarting,
    Stopped,
}

/// A control request observed by the running supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Stop,
    /// Terminate the current tool and relaunch without waiting.
    Restart,
}

/// How a supervisor task ended.
#[derive(Debug)]
pub enum SupervisorExit {
    Stopped,
    LaunchFailed(CollectorError),
}

/// Why a stream stopped producing lines.
#[derive(Debug)]
pub enum StreamOutcome {
    Ended,
    ReadFailed(CollectorError),
    Interrupted(Interrupt),
}

/// Result of consuming one tool output stream.
#[derive(Debug)]
pub struct StreamReport {
    pub outcome: StreamOutcome,
    /// Data lines parsed, header excluded.
    pub lines: u64,
}

/// Supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub restart_delay: Duration,
    pub fields: Vec<FieldSpec>,
    /// Treat a failed launch like an ended stream instead of giving up.
    pub retry_on_launch_failure: bool,
    pub max_line_bytes: usize,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            restart_delay: DEFAULT_RESTART_DELAY,
            fields: default_fields(),
            retry_on_launch_failure: false,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

#[derive(Default)]
struct ControlState {
    stop_requested: bool,
    restart_requested: bool,
    child: Option<Child>,
    phase: SupervisorPhase,
}

/// State shared between one supervisor run and its controller.
#[derive(Default)]
pub struct SupervisorControl {
    state: Mutex<ControlState>,
    wake: Notify,
}

impl SupervisorControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Asks the supervisor to stop for good and terminates the live tool so a
    /// blocked read returns promptly. Safe to call any number of times.
    pub fn request_stop(&self) {
        {
            let mut state = self.lock();
            state.stop_requested = true;
            if let Some(child) = state.child.as_mut() {
                terminate(child);
            }
        }
        self.wake.notify_one();
    }

    /// Asks the supervisor to replace the live tool right away.
    pub fn request_restart(&self) {
        {
            let mut state = self.lock();
            if state.stop_requested {
                return;
            }
            state.restart_requested = true;
            if let Some(child) = state.child.as_mut() {
                terminate(child);
            }
        }
        self.wake.notify_one();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    pub fn phase(&self) -> SupervisorPhase {
        self.lock().phase
    }

    /// Pid of the live tool, if one is recorded.
    pub fn child_pid(&self) -> Option<u32> {
        self.lock().child.as_ref().and_then(Child::id)
    }

    fn set_phase(&self, phase: SupervisorPhase) {
        self.lock().phase = phase;
    }

    /// Pending request, if any. A stop stays pending; a restart is consumed.
    fn take_interrupt(&self) -> Option<Interrupt> {
        let mut state = self.lock();
        if state.stop_requested {
            Some(Interrupt::Stop)
        } else if state.restart_requested {
            state.restart_requested = false;
            Some(Interrupt::Restart)
        } else {
            None
        }
    }

    /// Tokenizes `command` and spawns it, unless a stop is already pending.
    ///
    /// The command is read under the control lock. A command change followed
    /// by a restart request is therefore either picked up here, or the
    /// request finds the new child recorded and terminates it.
    ///
    /// Returns `Ok(None)` when stopping, otherwise the tool's stdout and the
    /// argv it was started with.
    fn launch(
        &self,
        command: &CommandSpec,
    ) -> Result<Option<(ChildStdout, Vec<String>)>, CollectorError> {
        let mut state = self.lock();
        if state.stop_requested {
            return Ok(None);
        }
        state.phase = SupervisorPhase::Launching;
        state.restart_requested = false;

        let argv = command.argv();
        let (program, args) = argv.split_first().ok_or(CollectorError::EmptyCommand)?;
        let command_line = argv.join(" ");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CollectorError::LaunchFailure {
                command: command_line.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CollectorError::LaunchFailure {
                command: command_line,
                source: io::Error::other("stdout was not captured"),
            })?;

        state.child = Some(child);
        Ok(Some((stdout, argv)))
    }

    fn take_child(&self) -> Option<Child> {
        self.lock().child.take()
    }
}

/// Sends SIGTERM to a child that has not been reaped yet.
fn terminate(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    debug!("Sending SIGTERM to tool process {}", pid);
    if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        debug!("SIGTERM to {} failed ({}), killing", pid, e);
        if let Err(e) = child.start_kill() {
            warn!("Failed to kill tool process {}: {}", pid, e);
        }
    }
}

/// Runs the external tool and keeps the sample store fed.
pub struct Supervisor {
    command: CommandSpec,
    settings: SupervisorSettings,
    store: Arc<SampleStore>,
    stats: Arc<SupervisorStats>,
    control: Arc<SupervisorControl>,
}

impl Supervisor {
    pub fn new(
        command: CommandSpec,
        settings: SupervisorSettings,
        store: Arc<SampleStore>,
        stats: Arc<SupervisorStats>,
    ) -> Self {
        Self {
            command,
            settings,
            store,
            stats,
            control: Arc::new(SupervisorControl::new()),
        }
    }

    /// Handle for stopping or restarting this supervisor.
    pub fn control(&self) -> Arc<SupervisorControl> {
        Arc::clone(&self.control)
    }

    /// Runs until stopped or until a launch fails.
    ///
    /// Consumes the supervisor: a stopped instance cannot be run again.
    #[instrument(skip(self), name = "supervisor")]
    pub async fn run(self) -> SupervisorExit {
        info!("Supervisor started");
        self.store.clear();

        let exit = loop {
            let (stdout, argv) = match self.control.launch(&self.command) {
                Ok(Some(launched)) => launched,
                Ok(None) => break SupervisorExit::Stopped,
                Err(e) => {
                    self.stats.record_launch_failure();
                    error!("{}", e);
                    if !self.settings.retry_on_launch_failure {
                        break SupervisorExit::LaunchFailed(e);
                    }
                    warn!(
                        "Retrying launch in {}s",
                        self.settings.restart_delay.as_secs_f64()
                    );
                    if self.restart_delay().await == Some(Interrupt::Stop) {
                        break SupervisorExit::Stopped;
                    }
                    continue;
                }
            };

            self.stats.record_launch();
            info!("Launched '{}'", argv.join(" "));

            let started = Instant::now();
            let report = self.consume_stream(BufReader::new(stdout)).await;
            self.stats
                .record_run(report.lines, started.elapsed().as_secs_f64());
            self.control.set_phase(SupervisorPhase::Exited);

            let stopping = matches!(report.outcome, StreamOutcome::Interrupted(Interrupt::Stop));
            self.reap(stopping).await;

            match report.outcome {
                StreamOutcome::Interrupted(Interrupt::Stop) => break SupervisorExit::Stopped,
                StreamOutcome::Interrupted(Interrupt::Restart) => {
                    info!("Restart requested, relaunching");
                    self.stats.record_restart();
                    continue;
                }
                StreamOutcome::ReadFailed(e) => warn!("{}", e),
                StreamOutcome::Ended => debug!("{}", CollectorError::StreamEnded),
            }

            warn!(
                "'{}' is finished after {} lines, restarting in {}s",
                argv.first().map(String::as_str).unwrap_or_default(),
                report.lines,
                self.settings.restart_delay.as_secs_f64()
            );
            self.stats.record_restart();

            if self.restart_delay().await == Some(Interrupt::Stop) {
                break SupervisorExit::Stopped;
            }
        };

        if let Some(mut child) = self.control.take_child() {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill tool process: {}", e);
            }
        }
        self.control.set_phase(SupervisorPhase::Stopped);
        info!("Supervisor stopped");
        exit
    }

    /// Reads lines until the stream ends or a request interrupts it.
    ///
    /// The first line is discarded unconditionally. Every following line is
    /// parsed, stamped with the current wall-clock second and written to the
    /// store. Invalid UTF-8 is replaced rather than treated as an error. A
    /// line longer than `max_line_bytes` is skipped up to its newline and
    /// counted as malformed.
    pub async fn consume_stream<R>(&self, mut reader: R) -> StreamReport
    where
        R: AsyncBufRead + Unpin,
    {
        self.control.set_phase(SupervisorPhase::Streaming);

        let limit = self.settings.max_line_bytes.max(1);
        let mut buf = Vec::with_capacity(512);
        let mut header_seen = false;
        let mut skipping = false;
        let mut lines = 0u64;

        loop {
            let budget = limit.saturating_sub(buf.len()).max(1) as u64;
            let mut limited = (&mut reader).take(budget);
            let read = tokio::select! {
                biased;
                _ = self.control.wake.notified() => {
                    match self.control.take_interrupt() {
                        Some(interrupt) => {
                            return StreamReport {
                                outcome: StreamOutcome::Interrupted(interrupt),
                                lines,
                            };
                        }
                        None => continue,
                    }
                }
                read = limited.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => {
                    return StreamReport {
                        outcome: StreamOutcome::Ended,
                        lines,
                    };
                }
                Ok(_) => {
                    let complete = buf.last() == Some(&b'\n');
                    if skipping {
                        // Tail of an over-long line.
                        skipping = !complete;
                        buf.clear();
                        continue;
                    }
                    if !complete && buf.len() >= limit {
                        skipping = true;
                        buf.clear();
                        if header_seen {
                            self.stats
                                .record_oversized_line(self.settings.fields.len());
                            warn!("Output line longer than {} bytes, skipping it", limit);
                        } else {
                            header_seen = true;
                            self.stats.record_header();
                            debug!("Discarding over-long header");
                        }
                        continue;
                    }

                    let line = String::from_utf8_lossy(&buf);
                    if header_seen {
                        self.handle_line(&line);
                        lines += 1;
                    } else {
                        header_seen = true;
                        self.stats.record_header();
                        debug!("Discarding header: {:?}", line.trim_end());
                    }
                    buf.clear();
                }
                Err(e) => {
                    self.stats.record_stream_read_error();
                    return StreamReport {
                        outcome: StreamOutcome::ReadFailed(CollectorError::StreamRead(e)),
                        lines,
                    };
                }
            }
        }
    }

    fn handle_line(&self, line: &str) {
        let parsed = parse_line(line, &self.settings.fields);
        self.stats.record_line(parsed.unavailable, parsed.malformed);

        let sample = Sample::from_parsed(parsed, chrono::Utc::now().timestamp());
        debug!("Sample: {:?}", sample.values);
        self.store.write(sample);
    }

    /// Waits for the tool to exit, killing it if that fails or takes too long.
    async fn reap(&self, force: bool) {
        let Some(mut child) = self.control.take_child() else {
            return;
        };

        if force {
            if let Err(e) = child.start_kill() {
                debug!("Kill before reap failed: {}", e);
            }
        }

        match tokio::time::timeout(REAP_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => debug!("Tool exited: {}", status),
            Ok(Err(e)) => {
                self.stats.record_reap_failure();
                warn!("{}, killing", CollectorError::ReapFailure(e));
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill tool process: {}", e);
                }
            }
            Err(_) => {
                self.stats.record_reap_failure();
                warn!(
                    "Tool did not exit within {}s, killing",
                    REAP_TIMEOUT.as_secs_f64()
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill tool process: {}", e);
                }
            }
        }
    }

    /// Sleeps for the restart delay unless a request arrives first.
    async fn restart_delay(&self) -> Option<Interrupt> {
        self.control.set_phase(SupervisorPhase::Restarting);
        if let Some(interrupt) = self.control.take_interrupt() {
            return Some(interrupt);
        }

        let sleep = tokio::time::sleep(self.settings.restart_delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                _ = self.control.wake.notified() => {
                    if let Some(interrupt) = self.control.take_interrupt() {
                        return Some(interrupt);
                    }
                }
                _ = &mut sleep => return None,
            }
        }
    }
}
