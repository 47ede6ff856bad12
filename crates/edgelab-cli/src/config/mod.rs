//! Configuration system with multi-source loading.
//!
//! Merges settings from CLI args, environment variables, and the config file.
//! Priority: CLI > Environment > File > Defaults

mod defaults;
mod loading;
mod validation;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use defaults::*;
pub use loading::CONFIG_FILE_NAME;

/// edgelab configuration, loaded from edgelab.config.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EdgelabConfig {
    /// Entry point of the edge function (e.g. "src/index.js")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<PathBuf>,

    #[serde(default)]
    pub dev: DevSettings,

    #[serde(default)]
    pub runtime: RuntimeSettings,

    #[serde(default)]
    pub bundler: BundlerSettings,

    #[serde(default)]
    pub kv: KvSettings,

    #[serde(default)]
    pub cache: CacheSettings,
}

/// Dev session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DevSettings {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub minify: bool,

    /// Origin request hosts are rewritten to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_upstream: Option<String>,

    /// Command run before every rebuild
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_command: Option<String>,

    /// Trailing debounce window for file changes
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,

    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    /// Inspector port for the in-process runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspect_port: Option<u16>,
}

/// Which runtime flavor to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuntimeFlavor {
    /// Bridged sandbox if its binary is installed, otherwise in-process.
    #[default]
    Auto,
    InProcess,
    Bridged,
}

/// Runtime process settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuntimeSettings {
    #[serde(default)]
    pub flavor: RuntimeFlavor,

    /// Sandbox binary for the bridged flavor
    #[serde(default = "default_runtime_binary")]
    pub binary: String,

    /// Script host for the in-process flavor
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    #[serde(default = "default_cpu_time_ms")]
    pub cpu_time_ms: u64,

    #[serde(default = "default_wall_time_ms")]
    pub wall_time_ms: u64,

    #[serde(default = "default_memory_mb")]
    pub memory_mb: u32,

    #[serde(default)]
    pub allow_remote_modules: bool,
}

/// External bundler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BundlerSettings {
    #[serde(default = "default_bundler_command")]
    pub command: String,

    /// Extra modules to leave out of the bundle
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external: Vec<String>,
}

/// Mock KV settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KvSettings {
    /// Seed file loaded once at startup (in-process flavor)
    #[serde(default = "default_kv_seed_file")]
    pub seed_file: PathBuf,

    /// Persistent store (bridged flavor), relative to the project
    #[serde(default = "default_kv_store_file")]
    pub store_file: PathBuf,
}

/// Mock cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheSettings {
    /// Reported quota; never enforced
    #[serde(default = "default_cache_quota_bytes")]
    pub quota_bytes: u64,
}
