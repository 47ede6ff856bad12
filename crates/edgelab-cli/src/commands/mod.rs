//! Command implementations for the edgelab CLI.
//!
//! - [`dev`] - Local dev session with rebuild on save
//! - [`sessions`] - List sessions recorded in the project's registry
//!
//! Each command provides an `execute` function that takes the parsed command
//! arguments and returns a Result.

pub mod dev;
pub mod sessions;

pub use dev::execute as dev_execute;
pub use sessions::execute as sessions_execute;
