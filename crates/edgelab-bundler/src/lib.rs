//! # edgelab-bundler
//!
//! Turns a user entry file into a runnable artifact for one dev session.
//!
//! ```text
//! user entry ──► generated wrapper ──► external bundler ──► rewrite ──► artifact
//! ```
//!
//! - [`entry`]: wrapper generation with mock service clients
//! - [`bundler`]: the [`Bundler`] seam and the esbuild adapter
//! - [`rewrite`]: oxc-based member-access renaming
//! - [`pipeline`]: the atomic per-session build

pub mod bundler;
pub mod entry;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod rewrite;

pub use bundler::{BundleRequest, Bundler, EsbuildBundler, Format, HOST_MODULES, Platform};
pub use entry::{EntryFlavor, EntryTemplate, READY_PATH, USER_ENTRY_SPECIFIER};
pub use error::{BundleError, Result};
pub use layout::SessionLayout;
pub use pipeline::{BuildPipeline, PipelineOptions};
pub use rewrite::{RenameTable, RewriteOutput, rewrite, rewrite_source};
