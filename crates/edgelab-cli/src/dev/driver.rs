//! Runtime drivers.
//!
//! A driver knows how to launch one runtime flavor: which wrapper the
//! pipeline must generate, what goes in the per-session runtime config, the
//! command line, and where readiness is probed. The flavor is chosen once at
//! startup by [`RuntimeKind::detect`].

use crate::config::{RuntimeFlavor, RuntimeSettings};
use crate::dev::context::SessionContext;
use crate::error::{BuildError, Result};
use edgelab_bundler::{EntryFlavor, READY_PATH};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// Runtime flavor resolved for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    /// Script host running the bundle directly on the dev port.
    InProcess,
    /// Sandbox binary behind the request bridge.
    Bridged,
}

impl RuntimeKind {
    /// Explicit flavor wins; `auto` picks bridged when the sandbox binary is installed.
    pub fn detect(settings: &RuntimeSettings) -> Self {
        match settings.flavor {
            RuntimeFlavor::InProcess => RuntimeKind::InProcess,
            RuntimeFlavor::Bridged => RuntimeKind::Bridged,
            RuntimeFlavor::Auto => {
                if find_program(&settings.binary).is_some() {
                    RuntimeKind::Bridged
                } else {
                    RuntimeKind::InProcess
                }
            }
        }
    }

    pub fn entry_flavor(self) -> EntryFlavor {
        match self {
            RuntimeKind::InProcess => EntryFlavor::HostGlobals,
            RuntimeKind::Bridged => EntryFlavor::Sandbox,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeKind::InProcess => "in-process",
            RuntimeKind::Bridged => "bridged",
        }
    }
}

/// Locate `program` the way a shell would: as a path if it has a separator,
/// otherwise on `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .flat_map(|dir| {
            let plain = dir.join(program);
            let exe = dir.join(format!("{}.exe", program));
            [plain, exe]
        })
        .find(|p| p.is_file())
}

/// Sandbox resource limits written to the runtime config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SandboxPolicy {
    pub cpu_time_ms: u64,
    pub wall_time_ms: u64,
    pub memory_mb: u32,
    pub allow_remote_modules: bool,
}

impl From<&RuntimeSettings> for SandboxPolicy {
    fn from(settings: &RuntimeSettings) -> Self {
        Self {
            cpu_time_ms: settings.cpu_time_ms,
            wall_time_ms: settings.wall_time_ms,
            memory_mb: settings.memory_mb,
            allow_remote_modules: settings.allow_remote_modules,
        }
    }
}

/// Contents of `.dev/runtime-<id>.toml`.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeConfig {
    pub session: String,
    pub listen_port: u16,
    pub artifact: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxPolicy>,
}

impl RuntimeConfig {
    pub fn write(&self, path: &Path) -> Result<()> {
        let content = toml::to_string(self).map_err(|e| BuildError::RuntimeConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| BuildError::RuntimeConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

/// Launch recipe for one runtime flavor.
pub trait RuntimeDriver: Send + Sync {
    fn kind(&self) -> RuntimeKind;

    /// Program name used in spawn error messages.
    fn program(&self) -> &str;

    fn entry_flavor(&self) -> EntryFlavor {
        self.kind().entry_flavor()
    }

    fn runtime_config(&self, ctx: &SessionContext, artifact: &Path) -> RuntimeConfig;

    /// Write the per-session runtime config.
    fn prepare(&self, ctx: &SessionContext, artifact: &Path) -> Result<PathBuf> {
        let path = ctx.layout.runtime_config();
        self.runtime_config(ctx, artifact).write(&path)?;
        Ok(path)
    }

    /// Command line of the runtime child, stdio left to the caller.
    fn command(&self, ctx: &SessionContext, artifact: &Path) -> Command;

    /// URL polled until the runtime answers.
    fn readiness_url(&self, ctx: &SessionContext) -> String;
}

/// Runs the bundle in a local script host.
#[derive(Debug, Clone)]
pub struct InProcessDriver {
    interpreter: String,
}

impl InProcessDriver {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    pub fn args(&self, ctx: &SessionContext, artifact: &Path) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--allow-net".to_string(),
            "--allow-read".to_string(),
            "--allow-env".to_string(),
        ];
        if let Some(port) = ctx.inspect_port {
            args.push(format!("--inspect=127.0.0.1:{}", port));
        }
        args.push(artifact.display().to_string());
        args
    }
}

impl RuntimeDriver for InProcessDriver {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::InProcess
    }

    fn program(&self) -> &str {
        &self.interpreter
    }

    fn runtime_config(&self, ctx: &SessionContext, artifact: &Path) -> RuntimeConfig {
        RuntimeConfig {
            session: ctx.id.to_string(),
            listen_port: ctx.runtime_port,
            artifact: artifact.to_path_buf(),
            bridge_port: None,
            sandbox: None,
        }
    }

    fn command(&self, ctx: &SessionContext, artifact: &Path) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(self.args(ctx, artifact))
            .current_dir(&ctx.project_root)
            .stdin(Stdio::null());
        cmd
    }

    fn readiness_url(&self, ctx: &SessionContext) -> String {
        format!("http://127.0.0.1:{}{}", ctx.runtime_port, READY_PATH)
    }
}

/// Runs the bundle in the sandbox binary; traffic reaches it through the bridge.
#[derive(Debug, Clone)]
pub struct BridgedDriver {
    binary: String,
    policy: SandboxPolicy,
}

impl BridgedDriver {
    pub fn new(binary: impl Into<String>, policy: SandboxPolicy) -> Self {
        Self {
            binary: binary.into(),
            policy,
        }
    }
}

impl RuntimeDriver for BridgedDriver {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Bridged
    }

    fn program(&self) -> &str {
        &self.binary
    }

    fn runtime_config(&self, ctx: &SessionContext, artifact: &Path) -> RuntimeConfig {
        RuntimeConfig {
            session: ctx.id.to_string(),
            listen_port: ctx.runtime_port,
            artifact: artifact.to_path_buf(),
            bridge_port: ctx.bridge_port,
            sandbox: Some(self.policy.clone()),
        }
    }

    fn command(&self, ctx: &SessionContext, _artifact: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--config")
            .arg(ctx.layout.runtime_config())
            .current_dir(&ctx.project_root)
            .stdin(Stdio::null());
        cmd
    }

    fn readiness_url(&self, ctx: &SessionContext) -> String {
        let port = ctx.bridge_port.unwrap_or(ctx.runtime_port);
        format!("http://127.0.0.1:{}/", port)
    }
}

/// Build the driver for `kind` from the runtime settings.
pub fn driver_for(kind: RuntimeKind, settings: &RuntimeSettings) -> Arc<dyn RuntimeDriver> {
    match kind {
        RuntimeKind::InProcess => Arc::new(InProcessDriver::new(&settings.interpreter)),
        RuntimeKind::Bridged => Arc::new(BridgedDriver::new(&settings.binary, settings.into())),
    }
}
