//! Command-line interface definition for edgelab.
//!
//! - `edgelab dev [ENTRY]` runs a local dev session
//! - `edgelab sessions` lists sessions recorded in the project's registry

mod commands;
mod tests;
mod validation;

use clap::Parser;

pub use commands::{Command, DevArgs, SessionsArgs};
pub use validation::parse_local_upstream;

/// edgelab - run edge functions locally against mocked platform services
#[derive(Parser, Debug)]
#[command(
    name = "edgelab",
    version,
    about = "Run edge functions locally against mocked platform services",
    long_about = "edgelab bundles your edge function, runs it in a local sandbox with mock\n\
                  Cache and KV services, proxies HTTP traffic to it, and rebuilds on every save."
)]
pub struct Cli {
    /// Enable debug logging
    ///
    /// Shows bundler invocations, runtime state transitions, and mock
    /// service traffic.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
