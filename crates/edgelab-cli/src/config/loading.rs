use crate::cli::DevArgs;
use crate::config::EdgelabConfig;
use crate::error::{ConfigError, Result};
use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized},
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Config file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "edgelab.config.json";

/// CLI flags that were actually given. Absent flags leave lower layers alone.
#[derive(Debug, Default, Serialize)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    entry: Option<PathBuf>,
    dev: DevOverrides,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct DevOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    minify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_upstream: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_command: Option<String>,
}

impl CliOverrides {
    fn from_dev_args(args: &DevArgs) -> Self {
        Self {
            entry: args.entry.clone(),
            dev: DevOverrides {
                port: args.port,
                minify: args.minify.then_some(true),
                local_upstream: args.local_upstream.clone(),
                refresh_command: args.refresh_command.clone(),
            },
        }
    }
}

impl EdgelabConfig {
    /// Load configuration for a dev session.
    /// Priority: CLI args > environment variables > config file > defaults
    pub fn load(args: &DevArgs, project_root: &Path) -> Result<Self> {
        Self::load_layers(project_root, args.config.as_deref(), CliOverrides::from_dev_args(args))
    }

    /// Load configuration without CLI overrides.
    pub fn load_project(project_root: &Path) -> Result<Self> {
        Self::load_layers(project_root, None, CliOverrides::default())
    }

    fn load_layers(
        project_root: &Path,
        config_path: Option<&Path>,
        overrides: CliOverrides,
    ) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default_config()));

        let config_file = match config_path {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    project_root.join(path)
                };
                if !path.exists() {
                    return Err(ConfigError::NotFound(path).into());
                }
                Some(path)
            }
            None => {
                let default_path = project_root.join(CONFIG_FILE_NAME);
                default_path.exists().then_some(default_path)
            }
        };

        if let Some(path) = config_file {
            tracing::debug!(path = %path.display(), "loading config file");
            figment = figment.merge(Json::file(path));
        }

        // EDGELAB_DEV__LOCAL_UPSTREAM=localhost:3000 sets dev.localUpstream
        figment = figment.merge(env_provider());

        figment = figment.merge(Serialized::defaults(overrides));

        figment.extract().map_err(|e| {
            ConfigError::InvalidValue {
                field: "configuration".to_string(),
                value: e.to_string(),
                hint: format!("Check {} syntax and field types", CONFIG_FILE_NAME),
            }
            .into()
        })
    }
}

/// Top-level keys environment variables may set.
const ENV_SECTIONS: &[&str] = &["entry", "dev", "runtime", "bundler", "kv", "cache"];

fn env_provider() -> Env {
    Env::prefixed("EDGELAB_")
        .lowercase(false)
        .map(|key| env_key_to_path(key.as_str()).into())
        .filter(|key| {
            let section = key.as_str().split('.').next().unwrap_or("");
            ENV_SECTIONS.contains(&section)
        })
}

/// `DEV__LOCAL_UPSTREAM` -> `dev.localUpstream`.
pub(crate) fn env_key_to_path(key: &str) -> String {
    key.to_ascii_lowercase()
        .split("__")
        .map(|segment| {
            let mut out = String::with_capacity(segment.len());
            let mut upper = false;
            for ch in segment.chars() {
                if ch == '_' {
                    upper = true;
                } else if upper {
                    out.push(ch.to_ascii_uppercase());
                    upper = false;
                } else {
                    out.push(ch);
                }
            }
            out
        })
        .collect::<Vec<_>>()
        .join(".")
}
