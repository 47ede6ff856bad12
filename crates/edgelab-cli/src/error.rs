//! Error handling for the edgelab CLI.
//!
//! Errors split along how far they reach:
//! - **Session-fatal** (`CliError` variants returned from commands): build
//!   failures, spawn failures, readiness timeouts, bad configuration. These end
//!   the invocation with exit code 1.
//! - **Locally recovered**: proxy failures answer the one request with a 5xx,
//!   refresh-command failures are warned and the rebuild continues, a corrupt
//!   registry is treated as empty. Those are logged where they happen and
//!   never surface here.
//!
//! Every user-facing variant ends with a `Hint:` line.

use edgelab_bundler::BundleError;
use edgelab_mock::MockError;
use std::path::PathBuf;
use thiserror::Error;

pub mod miette;

pub use self::miette::cli_error_to_miette;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// The runtime child could not be started.
    #[error("{0}")]
    Spawn(#[from] SpawnError),

    /// The runtime never answered its readiness probe.
    #[error("Runtime did not become ready at {url} within {timeout_ms}ms\n\nHint: Run with --debug to see runtime output, or raise dev.readinessTimeoutMs")]
    ReadinessTimeout { url: String, timeout_ms: u64 },

    /// The runtime exited while it was still starting.
    #[error("Runtime exited before becoming ready: {0}\n\nHint: Check the runtime output above for the cause")]
    RuntimeExited(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Mock services error: {0}")]
    Mock(#[from] MockError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

}

impl From<BundleError> for CliError {
    fn from(err: BundleError) -> Self {
        CliError::Build(BuildError::Pipeline(err))
    }
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}\n\nHint: Create an edgelab.config.json file or omit --config", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid JSON in config file: {0}\n\nHint: Use a JSON validator to check syntax")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Missing required field: {field}\n\nHint: {hint}")]
    MissingField { field: String, hint: String },

    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        field: String,
        value: String,
        hint: String,
    },

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Build errors. All of them are fatal before the runtime is spawned.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{0}")]
    Pipeline(#[from] BundleError),

    #[error("Failed to write runtime config {}: {reason}\n\nHint: Check that the .dev directory is writable", .path.display())]
    RuntimeConfig { path: PathBuf, reason: String },
}

/// Failure to start the runtime child process.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("Runtime '{program}' was not found\n\nHint: Install it and make sure it is on PATH, or set runtime.binary / runtime.interpreter in edgelab.config.json")]
    NotFound { program: String },

    #[error("Permission denied running '{program}'\n\nHint: Make it executable (chmod +x {program}) or run with elevated privileges")]
    PermissionDenied { program: String },

    #[error("Failed to start runtime '{program}': {source}")]
    Other {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    /// Classify an I/O error from `Command::spawn`.
    pub fn from_io(program: impl Into<String>, source: std::io::Error) -> Self {
        let program = program.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => SpawnError::NotFound { program },
            std::io::ErrorKind::PermissionDenied => SpawnError::PermissionDenied { program },
            _ => SpawnError::Other { program, source },
        }
    }
}

/// A refresh command was rejected or failed. Always recovered by the caller.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Refresh command is empty")]
    Empty,

    #[error("Refresh command '{command}' contains disallowed character {ch:?}\n\nHint: Refresh commands run without a shell; wrap complex steps in a script")]
    Disallowed { command: String, ch: char },

    #[error("Refresh command '{command}' could not be started: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Refresh command '{command}' failed with {status}")]
    Failed { command: String, status: String },
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            match err {
                CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                    CliError::FileNotFound(path.as_ref().to_path_buf())
                }
                other => other,
            }
        })
    }

}
