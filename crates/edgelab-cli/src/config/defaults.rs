use crate::config::{
    BundlerSettings, CacheSettings, DevSettings, EdgelabConfig, KvSettings, RuntimeFlavor,
    RuntimeSettings,
};
use std::path::PathBuf;

pub fn default_port() -> u16 {
    18080
}

pub fn default_debounce_ms() -> u64 {
    500
}

pub fn default_readiness_timeout_ms() -> u64 {
    60_000
}

pub fn default_probe_interval_ms() -> u64 {
    500
}

pub fn default_runtime_binary() -> String {
    "edge-sandbox".to_string()
}

pub fn default_interpreter() -> String {
    "deno".to_string()
}

pub fn default_cpu_time_ms() -> u64 {
    100
}

pub fn default_wall_time_ms() -> u64 {
    30_000
}

pub fn default_memory_mb() -> u32 {
    128
}

pub fn default_bundler_command() -> String {
    "esbuild".to_string()
}

pub fn default_kv_seed_file() -> PathBuf {
    PathBuf::from("kv.seed.json")
}

pub fn default_kv_store_file() -> PathBuf {
    PathBuf::from(".dev/kv-store.json")
}

pub fn default_cache_quota_bytes() -> u64 {
    edgelab_mock::cache::DEFAULT_QUOTA_BYTES
}

impl Default for DevSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            minify: false,
            local_upstream: None,
            refresh_command: None,
            debounce_ms: default_debounce_ms(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
            probe_interval_ms: default_probe_interval_ms(),
            inspect_port: None,
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            flavor: RuntimeFlavor::Auto,
            binary: default_runtime_binary(),
            interpreter: default_interpreter(),
            cpu_time_ms: default_cpu_time_ms(),
            wall_time_ms: default_wall_time_ms(),
            memory_mb: default_memory_mb(),
            allow_remote_modules: false,
        }
    }
}

impl Default for BundlerSettings {
    fn default() -> Self {
        Self {
            command: default_bundler_command(),
            external: Vec::new(),
        }
    }
}

impl Default for KvSettings {
    fn default() -> Self {
        Self {
            seed_file: default_kv_seed_file(),
            store_file: default_kv_store_file(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            quota_bytes: default_cache_quota_bytes(),
        }
    }
}

impl EdgelabConfig {
    /// Default configuration values.
    pub fn default_config() -> Self {
        Self {
            entry: None,
            dev: DevSettings::default(),
            runtime: RuntimeSettings::default(),
            bundler: BundlerSettings::default(),
            kv: KvSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}
