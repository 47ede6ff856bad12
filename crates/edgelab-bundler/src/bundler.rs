//! External bundler adapter.
//!
//! Bundling is delegated to a bundler executable (esbuild by default). The
//! [`Bundler`] trait is the seam tests and alternative bundlers plug into.

use crate::error::{BundleError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

/// Modules the runtime provides itself; never inlined into the bundle.
pub const HOST_MODULES: &[&str] = &[
    "node:buffer",
    "node:crypto",
    "node:events",
    "node:stream",
    "node:util",
];

/// Output module format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Esm,
    Cjs,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Esm => "esm",
            Format::Cjs => "cjs",
        }
    }
}

/// Target platform passed through to the bundler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    Browser,
    Neutral,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Browser => "browser",
            Platform::Neutral => "neutral",
        }
    }
}

/// One bundler invocation.
#[derive(Debug, Clone)]
pub struct BundleRequest {
    pub entry_points: Vec<PathBuf>,
    pub outfile: PathBuf,
    pub format: Format,
    pub platform: Platform,
    pub external: Vec<String>,
    pub minify: bool,
    /// Import specifier substitutions, `specifier -> path`.
    pub alias: Vec<(String, PathBuf)>,
    /// Directory the bundler resolves bare imports from.
    pub cwd: PathBuf,
}

#[async_trait]
pub trait Bundler: Send + Sync {
    /// Bundle `request.entry_points` into `request.outfile`.
    async fn bundle(&self, request: &BundleRequest) -> Result<()>;
}

/// Runs the esbuild command line.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    command: String,
}

impl EsbuildBundler {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Command-line arguments for `request`.
    pub fn args(request: &BundleRequest) -> Vec<String> {
        let mut args: Vec<String> = request
            .entry_points
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        args.push("--bundle".to_string());
        args.push(format!("--outfile={}", request.outfile.display()));
        args.push(format!("--format={}", request.format.as_str()));
        args.push(format!("--platform={}", request.platform.as_str()));
        args.push("--log-level=warning".to_string());

        for external in &request.external {
            args.push(format!("--external:{external}"));
        }
        for (specifier, target) in &request.alias {
            args.push(format!("--alias:{specifier}={}", target.display()));
        }
        if request.minify {
            args.push("--minify".to_string());
        }
        args
    }
}

impl Default for EsbuildBundler {
    fn default() -> Self {
        Self::new("esbuild")
    }
}

#[async_trait]
impl Bundler for EsbuildBundler {
    async fn bundle(&self, request: &BundleRequest) -> Result<()> {
        let args = Self::args(request);
        tracing::debug!(command = %self.command, ?args, "running bundler");

        let output = Command::new(&self.command)
            .args(&args)
            .current_dir(&request.cwd)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| BundleError::BundlerUnavailable {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(BundleError::BundlerFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let warnings = String::from_utf8_lossy(&output.stderr);
        if !warnings.trim().is_empty() {
            tracing::warn!("{}", warnings.trim());
        }
        Ok(())
    }
}
