use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a local dev session
    ///
    /// Bundles the entry, starts the sandbox runtime, serves it on the dev
    /// port, and rebuilds and restarts whenever a source file changes.
    Dev(DevArgs),

    /// List dev sessions recorded for this project
    Sessions(SessionsArgs),
}

/// Arguments for the dev command
#[derive(Args, Debug, Default, Clone)]
pub struct DevArgs {
    /// Entry point of the edge function
    ///
    /// If omitted, read from "entry" in edgelab.config.json.
    #[arg(value_name = "ENTRY")]
    pub entry: Option<PathBuf>,

    /// Port to serve the function on
    ///
    /// If the port is busy, the next ten ports are tried.
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Minify the bundle
    #[arg(long)]
    pub minify: bool,

    /// Rewrite request hosts to this origin (e.g. localhost:3000)
    #[arg(long, value_name = "ORIGIN")]
    pub local_upstream: Option<String>,

    /// Command to run before every rebuild (e.g. "npm run codegen")
    ///
    /// Runs without a shell; shell metacharacters are rejected.
    #[arg(long, value_name = "COMMAND")]
    pub refresh_command: Option<String>,

    /// Project directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Path to the config file (defaults to edgelab.config.json in the project)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Arguments for the sessions command
#[derive(Args, Debug, Default, Clone)]
pub struct SessionsArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Print sessions as JSON
    #[arg(long)]
    pub json: bool,
}
