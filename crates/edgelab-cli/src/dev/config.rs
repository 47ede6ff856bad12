//! Dev session configuration.
//!
//! Resolves the loaded `EdgelabConfig` against the project root: absolute
//! entry path, work directory, listening port and runtime flavor.

use crate::config::EdgelabConfig;
use crate::dev::driver::RuntimeKind;
use crate::error::{ConfigError, Result};
use path_clean::PathClean;
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Work directory holding generated files, relative to the project root.
pub const WORK_DIR_NAME: &str = ".dev";

/// Resolved dev session configuration.
#[derive(Debug, Clone)]
pub struct DevConfig {
    /// Loaded and validated configuration
    pub base: EdgelabConfig,

    /// Project root (watched recursively)
    pub project_root: PathBuf,

    /// `<project_root>/.dev`
    pub work_dir: PathBuf,

    /// Absolute path of the user's entry module
    pub entry: PathBuf,

    /// Developer-facing address
    pub addr: SocketAddr,

    /// Runtime flavor picked for this session
    pub runtime: RuntimeKind,

    /// Patterns to ignore when watching files
    pub watch_ignore: Vec<String>,
}

impl DevConfig {
    /// Resolve a validated config for `project_root`.
    ///
    /// # Errors
    ///
    /// Returns error if the entry does not exist or no port near the
    /// requested one is free.
    pub fn resolve(base: EdgelabConfig, project_root: &Path) -> Result<Self> {
        let entry = base.entry.clone().ok_or_else(|| ConfigError::MissingField {
            field: "entry".to_string(),
            hint: "Pass the entry as `edgelab dev src/index.js` or set \"entry\" in edgelab.config.json"
                .to_string(),
        })?;

        let entry = if entry.is_absolute() {
            entry
        } else {
            project_root.join(entry)
        };
        let entry = entry.clean();

        if !entry.is_file() {
            return Err(ConfigError::InvalidValue {
                field: "entry".to_string(),
                value: entry.display().to_string(),
                hint: "Entry point does not exist".to_string(),
            }
            .into());
        }

        let addr = Self::find_available_port(base.dev.port)?;
        let runtime = RuntimeKind::detect(&base.runtime);

        let watch_ignore = vec![
            "node_modules".to_string(),
            "dist".to_string(),
            "build".to_string(),
            "*.log".to_string(),
            "*.partial".to_string(),
        ];

        Ok(Self {
            base,
            project_root: project_root.to_path_buf(),
            work_dir: project_root.join(WORK_DIR_NAME),
            entry,
            addr,
            runtime,
            watch_ignore,
        })
    }

    /// Find an available port starting from the requested port.
    ///
    /// Tries the requested port first, then the next 10.
    ///
    /// # Arguments
    ///
    /// * `requested_port` - First port to try on `127.0.0.1`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for `dev.port` when the whole range is taken
    pub fn find_available_port(requested_port: u16) -> Result<SocketAddr> {
        if requested_port < 1024 {
            crate::ui::warning(&format!(
                "Port {} is in privileged range, may require root access",
                requested_port
            ));
        }

        let addr = SocketAddr::from(([127, 0, 0, 1], requested_port));
        if TcpListener::bind(addr).is_ok() {
            return Ok(addr);
        }

        for offset in 1..=10 {
            let port = requested_port.saturating_add(offset);
            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            if TcpListener::bind(addr).is_ok() {
                crate::ui::warning(&format!(
                    "Port {} is busy, using port {} instead",
                    requested_port, port
                ));
                return Ok(addr);
            }
        }

        Err(ConfigError::InvalidValue {
            field: "dev.port".to_string(),
            value: requested_port.to_string(),
            hint: format!(
                "Ports {}-{} are all in use. Try a different port range.",
                requested_port,
                requested_port.saturating_add(10)
            ),
        }
        .into())
    }

    /// Let the OS pick a free loopback port.
    pub fn pick_free_port() -> Result<u16> {
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        Ok(listener.local_addr()?.port())
    }

    pub fn server_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.base.dev.debounce_ms)
    }
}

/// Resolve the project root from `--cwd` or the current directory.
pub fn resolve_project_root(cwd: Option<&Path>) -> Result<PathBuf> {
    let current = std::env::current_dir()?;
    let root = match cwd {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => current.join(dir),
        None => current,
    };

    if !root.is_dir() {
        return Err(ConfigError::InvalidValue {
            field: "cwd".to_string(),
            value: root.display().to_string(),
            hint: "Working directory does not exist".to_string(),
        }
        .into());
    }

    Ok(root.clean())
}
