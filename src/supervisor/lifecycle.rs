// src/supervisor/lifecycle.rs

use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::BufReader;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::config::{SupervisorConfig, validate_config};
use crate::errors::{Result, SupervisorError};
use crate::relay::{
    ControlLine, InputRelay, OutputRelay, RunGate, StreamKind, run_gate, spawn_discard,
};

use super::LifecycleState;

/// Control lines are only sent during `stop`, at most two at a time.
const CONTROL_CAPACITY: usize = 8;

/// Supervises one long-running child process and relays its stdio as lines.
///
/// - Lines sent on [`inbound`](Self::inbound) are written to the child's
///   stdin while it runs and held in the channel while it is stopped.
/// - Lines the child prints appear on the receivers from
///   [`take_stdout`](Self::take_stdout) / [`take_stderr`](Self::take_stderr).
///
/// The three relay loops are spawned by [`new`](Self::new) and survive any
/// number of start/stop cycles; each `start` hands them the new child's
/// pipes. Lifecycle methods take `&mut self` and are meant to be driven by a
/// single owner.
///
/// Dropping the supervisor without [`destroy`](Self::destroy) kills a
/// running child and lets the relay loops wind down on their own.
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    state: LifecycleState,
    /// Cleared once, by `destroy`.
    alive: Arc<AtomicBool>,

    child: Option<Child>,
    pid: Option<u32>,

    inbound: mpsc::Sender<String>,
    stdout: Option<mpsc::Receiver<String>>,
    stderr: Option<mpsc::Receiver<String>>,
    control: mpsc::Sender<ControlLine>,

    stdin_gate: RunGate<ChildStdin>,
    stdout_gate: RunGate<BufReader<ChildStdout>>,
    stderr_gate: RunGate<BufReader<ChildStderr>>,
    relays: Vec<JoinHandle<()>>,

    span: Span,
}

impl fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("name", &self.config.name)
            .field("state", &self.state)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    /// Build a supervisor and spawn its relay loops on the current tokio
    /// runtime. No child is started yet.
    pub fn new(config: SupervisorConfig) -> Result<Self> {
        validate_config(&config)?;
        let runtime = Handle::try_current()?;

        let span = info_span!("supervisor", name = %config.name);
        let alive = Arc::new(AtomicBool::new(true));

        let capacity = config.channel_capacity;
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (stdout_tx, stdout_rx) = mpsc::channel(capacity);
        let (stderr_tx, stderr_rx) = mpsc::channel(capacity);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);

        let (stdin_gate, stdin_gate_rx) = run_gate(StreamKind::Stdin);
        let (stdout_gate, stdout_gate_rx) = run_gate(StreamKind::Stdout);
        let (stderr_gate, stderr_gate_rx) = run_gate(StreamKind::Stderr);

        let relays = vec![
            runtime.spawn(
                InputRelay::new(stdin_gate_rx, control_rx, inbound_rx, Arc::clone(&alive))
                    .run()
                    .instrument(span.clone()),
            ),
            runtime.spawn(
                OutputRelay::new(StreamKind::Stdout, stdout_gate_rx, stdout_tx)
                    .run()
                    .instrument(span.clone()),
            ),
            runtime.spawn(
                OutputRelay::new(StreamKind::Stderr, stderr_gate_rx, stderr_tx)
                    .run()
                    .instrument(span.clone()),
            ),
        ];

        debug!(parent: &span, command = %config.launch.command, "supervisor created");

        Ok(Self {
            config,
            state: LifecycleState::NotStarted,
            alive,
            child: None,
            pid: None,
            inbound: inbound_tx,
            stdout: Some(stdout_rx),
            stderr: Some(stderr_rx),
            control: control_tx,
            stdin_gate,
            stdout_gate,
            stderr_gate,
            relays,
            span,
        })
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn status(&self) -> LifecycleState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }

    /// False once `destroy` has run.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Sender for lines destined for the child's stdin. A trailing `\n` is
    /// added to lines that lack one. Sends fail once the supervisor is
    /// destroyed.
    pub fn inbound(&self) -> mpsc::Sender<String> {
        self.inbound.clone()
    }

    /// Receiver of the child's stdout lines. Can be taken once, and only
    /// before the first successful `start`; after that an untaken stream is
    /// discarded and this returns `None`.
    pub fn take_stdout(&mut self) -> Option<mpsc::Receiver<String>> {
        self.stdout.take()
    }

    /// Receiver of the child's stderr lines. Same rules as
    /// [`take_stdout`](Self::take_stdout).
    pub fn take_stderr(&mut self) -> Option<mpsc::Receiver<String>> {
        self.stderr.take()
    }

    /// PID of the running child.
    pub fn pid(&self) -> Result<u32> {
        match (self.state, self.pid) {
            (LifecycleState::Running, Some(pid)) => Ok(pid),
            _ => Err(SupervisorError::NotRunning),
        }
    }

    /// Spawn a fresh child and resume all three relay loops on its pipes.
    ///
    /// On failure the state is left as it was.
    pub async fn start(&mut self) -> Result<()> {
        let span = self.span.clone();
        self.start_inner().instrument(span).await
    }

    /// Stop the running child.
    ///
    /// A non-empty `announcement` is written to the child (with the
    /// configured prefix) ahead of the shutdown command, and `delay` gives it
    /// time to be seen. The child then gets `stop_timeout` to exit before it
    /// is killed.
    pub async fn stop(&mut self, delay: Duration, announcement: &str) -> Result<()> {
        let span = self.span.clone();
        self.stop_inner(delay, announcement).instrument(span).await
    }

    /// Stop the child if it is running, then shut down the relay loops and
    /// close the inbound channel. The supervisor cannot be started again.
    pub async fn destroy(&mut self) -> Result<()> {
        let span = self.span.clone();
        self.destroy_inner().instrument(span).await
    }

    async fn start_inner(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Destroyed => return Err(SupervisorError::Destroyed),
            LifecycleState::Running => return Err(SupervisorError::AlreadyRunning),
            LifecycleState::NotStarted | LifecycleState::Stopped => {}
        }

        let mut child = self.spawn_child()?;
        let (stdin, stdout, stderr) = match take_pipes(&mut child) {
            Ok(pipes) => pipes,
            Err(e) => {
                abandon_child(&mut child);
                return Err(e);
            }
        };
        let pid = child.id().unwrap_or_default();
        info!(pid, "child forked");

        // Untaken outbound receivers are closed so the relays discard that
        // stream instead of filling the channel and stalling the child.
        if self.stdout.take().is_some() {
            debug!(stream = %StreamKind::Stdout, "receiver never taken; discarding output");
        }
        if self.stderr.take().is_some() {
            debug!(stream = %StreamKind::Stderr, "receiver never taken; discarding output");
        }

        let capacity = self.config.read_buffer_capacity;
        self.stdout_gate
            .resume(BufReader::with_capacity(capacity, stdout))
            .await;
        self.stderr_gate
            .resume(BufReader::with_capacity(capacity, stderr))
            .await;
        self.stdin_gate.resume(stdin).await;

        self.child = Some(child);
        self.pid = Some(pid);
        self.state = LifecycleState::Running;
        info!(pid, "child started");
        Ok(())
    }

    fn spawn_child(&self) -> Result<Child> {
        let launch = &self.config.launch;

        let mut cmd = Command::new(&launch.command);
        cmd.args(&launch.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &launch.dir {
            cmd.current_dir(dir);
        }

        cmd.spawn().map_err(|source| {
            error!(command = %launch.command, error = %source, "failed to spawn child");
            SupervisorError::Spawn {
                command: launch.command.clone(),
                source,
            }
        })
    }

    async fn stop_inner(&mut self, delay: Duration, announcement: &str) -> Result<()> {
        if self.state != LifecycleState::Running {
            return Err(SupervisorError::NotRunning);
        }
        self.state = LifecycleState::Stopped;
        let pid = self.pid.take().unwrap_or_default();
        info!(pid, "stopping child");

        if !announcement.is_empty() {
            let line = self.config.announcement_line(announcement);
            self.send_control(line).await;
        }

        if !delay.is_zero() {
            debug!(?delay, "waiting before shutdown");
            sleep(delay).await;
        }

        // Output is parked first so nothing the child prints while shutting
        // down is relayed. The retired pipes are drained in the background
        // until the child closes them.
        if let Some(stdout) = self.stdout_gate.pause().await {
            spawn_discard(StreamKind::Stdout, stdout);
        }
        if let Some(stderr) = self.stderr_gate.pause().await {
            spawn_discard(StreamKind::Stderr, stderr);
        }

        let shutdown = self.config.shutdown_command.clone();
        self.send_control(shutdown).await;

        // Parking the input relay stops caller lines; dropping the returned
        // stdin gives the child EOF right after the shutdown command.
        drop(self.stdin_gate.pause().await);

        let Some(child) = self.child.take() else {
            return Err(SupervisorError::NotRunning);
        };
        self.await_exit(child, pid).await
    }

    /// Queue a line on the control path and wait (bounded) until the input
    /// relay has written it.
    async fn send_control(&self, text: String) {
        let (line, written) = ControlLine::new(text);
        if self.control.send(line).await.is_err() {
            warn!("input relay gone; control line not delivered");
            return;
        }

        match timeout(self.config.stop_timeout, written).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!("control line discarded before reaching the child"),
            Err(_) => warn!(
                timeout = ?self.config.stop_timeout,
                "control line not written to child stdin in time"
            ),
        }
    }

    /// Wait for the child to exit, killing it after `stop_timeout`.
    async fn await_exit(&self, mut child: Child, pid: u32) -> Result<()> {
        let limit = self.config.stop_timeout;

        match timeout(limit, child.wait()).await {
            Ok(Ok(status)) => exit_result(pid, status, false),
            Ok(Err(source)) => Err(SupervisorError::Wait { pid, source }),
            Err(_) => {
                warn!(pid, timeout = ?limit, "child did not exit in time; killing");
                if let Err(e) = child.start_kill() {
                    warn!(pid, error = %e, "kill failed; reaping anyway");
                }

                // SIGKILL cannot be ignored, so the reap has to succeed.
                let source = match timeout(limit, child.wait()).await {
                    Ok(Ok(status)) => return exit_result(pid, status, true),
                    Ok(Err(source)) => source,
                    Err(_) => io::Error::new(
                        io::ErrorKind::TimedOut,
                        "child still running after kill",
                    ),
                };
                error!(pid, error = %source, "failed to reap child after kill");
                Err(SupervisorError::Reap { pid, source })
            }
        }
    }

    async fn destroy_inner(&mut self) -> Result<()> {
        if self.state == LifecycleState::Destroyed {
            return Err(SupervisorError::Destroyed);
        }

        let result = if self.state == LifecycleState::Running {
            let announcement = self.config.destroy_announcement.clone();
            self.stop_inner(Duration::ZERO, &announcement).await
        } else {
            Ok(())
        };

        self.state = LifecycleState::Destroyed;
        self.alive.store(false, Ordering::Release);

        self.stdin_gate.terminate().await;
        self.stdout_gate.terminate().await;
        self.stderr_gate.terminate().await;
        for relay in self.relays.drain(..) {
            if let Err(e) = relay.await {
                warn!(error = %e, "relay task did not finish cleanly");
            }
        }

        info!("supervisor destroyed");
        result
    }
}

/// Kill a child that was spawned but cannot be supervised. `kill_on_drop`
/// reaps it once the handle is gone.
fn abandon_child(child: &mut Child) {
    let pid = child.id().unwrap_or_default();
    warn!(pid, "killing child spawned without usable pipes");
    if let Err(e) = child.start_kill() {
        warn!(pid, error = %e, "kill failed");
    }
}

fn take_pipes(child: &mut Child) -> Result<(ChildStdin, ChildStdout, ChildStderr)> {
    let stdin = child
        .stdin
        .take()
        .ok_or(SupervisorError::MissingPipe("stdin"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or(SupervisorError::MissingPipe("stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or(SupervisorError::MissingPipe("stderr"))?;
    Ok((stdin, stdout, stderr))
}

fn exit_result(pid: u32, status: ExitStatus, forced: bool) -> Result<()> {
    if status.success() {
        info!(pid, "child exited cleanly");
        Ok(())
    } else {
        warn!(pid, %status, forced, "child exited unsuccessfully");
        Err(SupervisorError::ChildExit {
            pid,
            status,
            forced,
        })
    }
}
