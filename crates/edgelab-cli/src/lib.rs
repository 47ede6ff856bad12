//! edgelab CLI - local development emulator for edge functions.
//!
//! Runs a developer's edge function on their own machine against mocked
//! platform services, routes real HTTP traffic to it, and rebuilds and
//! restarts on every source change.
//!
//! # Architecture
//!
//! - [`cli`] - Argument parsing
//! - [`config`] - `edgelab.config.json` loading and validation
//! - [`dev`] - Session registry, runtime supervisor, request bridge, watcher
//! - [`commands`] - `dev` and `sessions`
//! - [`error`] - Error types with actionable hints
//! - [`logger`] - Structured logging with tracing
//! - [`ui`] - Terminal output
//!
//! Bundling lives in `edgelab-bundler`; the Cache and KV mocks in `edgelab-mock`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{BuildError, CliError, ConfigError, Result, ResultExt, SpawnError};
