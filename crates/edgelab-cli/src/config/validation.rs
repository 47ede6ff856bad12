use crate::cli::parse_local_upstream;
use crate::config::EdgelabConfig;
use crate::error::{ConfigError, Result};

impl EdgelabConfig {
    /// Validate configuration for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.entry.is_none() {
            return Err(ConfigError::MissingField {
                field: "entry".to_string(),
                hint: "Pass an entry point (edgelab dev src/index.js) or set \"entry\" in edgelab.config.json".to_string(),
            }
            .into());
        }

        if let Some(ref upstream) = self.dev.local_upstream {
            parse_local_upstream(upstream).map_err(|hint| ConfigError::InvalidValue {
                field: "dev.localUpstream".to_string(),
                value: upstream.clone(),
                hint,
            })?;
        }

        if self.dev.probe_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dev.probeIntervalMs".to_string(),
                value: "0".to_string(),
                hint: "Probe interval must be at least 1ms".to_string(),
            }
            .into());
        }

        if self.dev.readiness_timeout_ms < self.dev.probe_interval_ms {
            return Err(ConfigError::InvalidValue {
                field: "dev.readinessTimeoutMs".to_string(),
                value: self.dev.readiness_timeout_ms.to_string(),
                hint: format!(
                    "Readiness timeout must be at least the probe interval ({}ms)",
                    self.dev.probe_interval_ms
                ),
            }
            .into());
        }

        if self.dev.inspect_port.is_some() && self.dev.inspect_port == Some(self.dev.port) {
            return Err(ConfigError::InvalidValue {
                field: "dev.inspectPort".to_string(),
                value: self.dev.port.to_string(),
                hint: "Inspector port must differ from the dev port".to_string(),
            }
            .into());
        }

        if self.bundler.command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "bundler.command".to_string(),
                value: String::new(),
                hint: "Set it to an esbuild-compatible executable".to_string(),
            }
            .into());
        }

        Ok(())
    }
}
