//! Error types for the build pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while producing a session bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    /// User entry point does not exist.
    #[error("Entry point not found: {}\n\nHint: Pass an existing file, or set \"entry\" in edgelab.config.json", .0.display())]
    EntryNotFound(PathBuf),

    /// The external bundler executable could not be started.
    #[error("Bundler '{command}' could not be started: {source}\n\nHint: Install esbuild (npm i -D esbuild) or set bundler.command in edgelab.config.json")]
    BundlerUnavailable {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The external bundler ran and reported errors.
    #[error("Bundler failed with {status}:\n{stderr}")]
    BundlerFailed { status: String, stderr: String },

    /// Bundled output could not be parsed for rewriting.
    #[error("Failed to parse bundled output {}:\n{}", .path.display(), .errors.join("\n"))]
    Parse { path: PathBuf, errors: Vec<String> },

    /// Filesystem failure while staging the bundle.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BundleError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for build pipeline operations.
pub type Result<T, E = BundleError> = std::result::Result<T, E>;
