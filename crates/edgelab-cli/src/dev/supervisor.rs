//! Runtime process supervisor.
//!
//! Owns at most one runtime child and moves it through
//! `Idle → Starting → Ready → (Restarting → Starting) → Stopped | Failed`.
//! The current state is published on a `watch` channel so the dev loop (and
//! tests) can observe it without callbacks.
//!
//! The exit watcher decides whether an exit is a crash by looking at the state
//! when the child goes away: `Starting` and `Ready` mean nobody asked for it.

use crate::config::DevSettings;
use crate::dev::context::SessionContext;
use crate::dev::driver::RuntimeDriver;
use crate::error::{CliError, Result, SpawnError};
use crate::ui;
use parking_lot::Mutex;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// Lifecycle state of the runtime child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Idle,
    Starting,
    Ready,
    Restarting,
    Stopped,
    Failed,
}

impl RuntimeState {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeState::Idle => "idle",
            RuntimeState::Starting => "starting",
            RuntimeState::Ready => "ready",
            RuntimeState::Restarting => "restarting",
            RuntimeState::Stopped => "stopped",
            RuntimeState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// One line of runtime output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub line: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    pub probe_interval: Duration,
    pub readiness_timeout: Duration,
    /// How long `stop` waits after SIGTERM before killing.
    pub grace_period: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_millis(500),
            readiness_timeout: Duration::from_secs(60),
            grace_period: Duration::from_secs(5),
        }
    }
}

impl From<&DevSettings> for SupervisorOptions {
    fn from(settings: &DevSettings) -> Self {
        Self {
            probe_interval: Duration::from_millis(settings.probe_interval_ms),
            readiness_timeout: Duration::from_millis(settings.readiness_timeout_ms),
            ..Self::default()
        }
    }
}

struct ChildHandle {
    /// Cleared by the exit watcher once the child is reaped.
    pid: Arc<Mutex<Option<u32>>>,
    kill: Option<oneshot::Sender<()>>,
    exited: oneshot::Receiver<Option<ExitStatus>>,
}

pub struct Supervisor {
    ctx: SessionContext,
    driver: Arc<dyn RuntimeDriver>,
    options: SupervisorOptions,
    state: watch::Sender<RuntimeState>,
    child: Option<ChildHandle>,
    last_exit: Arc<Mutex<Option<String>>>,
    output: Option<mpsc::Sender<OutputLine>>,
    client: reqwest::Client,
}

impl Supervisor {
    pub fn new(
        ctx: SessionContext,
        driver: Arc<dyn RuntimeDriver>,
        options: SupervisorOptions,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .no_proxy()
            .build()?;
        let (state, _) = watch::channel(RuntimeState::Idle);

        Ok(Self {
            ctx,
            driver,
            options,
            state,
            child: None,
            last_exit: Arc::new(Mutex::new(None)),
            output: None,
            client,
        })
    }

    /// Send runtime output here instead of printing it.
    pub fn with_output(mut self, output: mpsc::Sender<OutputLine>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn status(&self) -> RuntimeState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RuntimeState> {
        self.state.subscribe()
    }

    /// Process id of the running child, `None` once it exited.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|handle| *handle.pid.lock())
    }

    /// Spawn the runtime for `artifact` and wait until it answers.
    ///
    /// # Errors
    ///
    /// - [`SpawnError`] if the program cannot be started
    /// - [`CliError::RuntimeExited`] if it exits before answering
    /// - [`CliError::ReadinessTimeout`] if it never answers (the child is killed)
    pub async fn start(&mut self, artifact: &Path) -> Result<()> {
        if self.child.is_some() {
            self.stop().await;
        }

        self.set_state(RuntimeState::Starting);
        *self.last_exit.lock() = None;

        if let Err(e) = self.driver.prepare(&self.ctx, artifact) {
            self.set_state(RuntimeState::Failed);
            return Err(e);
        }

        let mut cmd = self.driver.command(&self.ctx, artifact);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.set_state(RuntimeState::Failed);
                return Err(SpawnError::from_io(self.driver.program(), e).into());
            }
        };

        let pid = child.id();
        tracing::debug!(?pid, program = self.driver.program(), "runtime spawned");

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, OutputStream::Stdout, self.output.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, OutputStream::Stderr, self.output.clone()));
        }

        self.child = Some(self.watch_exit(child, pid));
        self.wait_ready().await
    }

    /// Stop the runtime: SIGTERM, then kill after the grace period.
    pub async fn stop(&mut self) {
        if self.status() != RuntimeState::Restarting {
            self.set_state(RuntimeState::Stopped);
        }

        let Some(mut handle) = self.child.take() else {
            return;
        };

        // Signal under the lock so a pid the watcher already reaped is never reused
        let signalled = {
            let pid = handle.pid.lock();
            pid.is_some() && terminate(*pid)
        };
        if !signalled {
            kill(&mut handle);
        }

        match tokio::time::timeout(self.options.grace_period, &mut handle.exited).await {
            Ok(_) => {}
            Err(_) => {
                let pid = *handle.pid.lock();
                tracing::warn!(?pid, "runtime ignored SIGTERM, killing");
                kill(&mut handle);
                let _ = handle.exited.await;
            }
        }
    }

    /// Stop and start again with a fresh artifact.
    ///
    /// The planned exit is not reported as a crash.
    pub async fn restart(&mut self, artifact: &Path) -> Result<()> {
        self.set_state(RuntimeState::Restarting);
        self.stop().await;
        self.start(artifact).await
    }

    fn set_state(&self, state: RuntimeState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = previous.as_str(), to = state.as_str(), "runtime state");
        }
    }

    fn watch_exit(&self, mut child: Child, pid: Option<u32>) -> ChildHandle {
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = oneshot::channel();
        let state = self.state.clone();
        let last_exit = Arc::clone(&self.last_exit);
        let pid_slot = Arc::new(Mutex::new(pid));
        let live_pid = Arc::clone(&pid_slot);

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status.ok(),
                _ = kill_rx => {
                    let _ = child.start_kill();
                    child.wait().await.ok()
                }
            };
            *live_pid.lock() = None;

            let described = status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown status".to_string());
            *last_exit.lock() = Some(described.clone());

            let current = *state.borrow();
            match current {
                RuntimeState::Starting | RuntimeState::Ready => {
                    if current == RuntimeState::Ready {
                        ui::warning(&format!(
                            "Runtime exited unexpectedly ({}); save a file to rebuild and restart",
                            described
                        ));
                    }
                    state.send_replace(RuntimeState::Failed);
                }
                _ => tracing::debug!(?pid, status = %described, "runtime exited"),
            }

            let _ = exit_tx.send(status);
        });

        ChildHandle {
            pid: pid_slot,
            kill: Some(kill_tx),
            exited: exit_rx,
        }
    }

    async fn wait_ready(&mut self) -> Result<()> {
        let url = self.driver.readiness_url(&self.ctx);
        let deadline = Instant::now() + self.options.readiness_timeout;
        let mut state_rx = self.state.subscribe();

        loop {
            if *state_rx.borrow_and_update() == RuntimeState::Failed {
                self.child = None;
                let status = self
                    .last_exit
                    .lock()
                    .clone()
                    .unwrap_or_else(|| "unknown status".to_string());
                return Err(CliError::RuntimeExited(status));
            }

            match self.client.get(&url).send().await {
                Ok(response) => {
                    tracing::debug!(status = %response.status(), %url, "runtime answered readiness probe");
                    self.set_state(RuntimeState::Ready);
                    return Ok(());
                }
                Err(e) => tracing::trace!(error = %e, %url, "readiness probe failed"),
            }

            if Instant::now() >= deadline {
                self.set_state(RuntimeState::Failed);
                if let Some(mut handle) = self.child.take() {
                    kill(&mut handle);
                    let _ = handle.exited.await;
                }
                return Err(CliError::ReadinessTimeout {
                    url,
                    timeout_ms: self.options.readiness_timeout.as_millis() as u64,
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(self.options.probe_interval) => {}
                _ = state_rx.changed() => {}
            }
        }
    }
}

fn kill(handle: &mut ChildHandle) {
    if let Some(tx) = handle.kill.take() {
        let _ = tx.send(());
    }
}

/// Ask the child to exit. Returns false when no signal could be sent.
#[cfg(unix)]
fn terminate(pid: Option<u32>) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return false;
    };
    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(pid, error = %e, "SIGTERM failed");
            false
        }
    }
}

#[cfg(not(unix))]
fn terminate(_pid: Option<u32>) -> bool {
    false
}

async fn forward_output<R>(reader: R, stream: OutputStream, sink: Option<mpsc::Sender<OutputLine>>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match &sink {
            Some(tx) => {
                if tx.send(OutputLine { stream, line }).await.is_err() {
                    break;
                }
            }
            None => ui::runtime_output(stream.as_str(), &line),
        }
    }
}
