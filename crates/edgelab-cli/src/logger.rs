//! Logging setup for the edgelab CLI.
//!
//! `--debug` turns on debug-level events for the edgelab crates, `--quiet`
//! keeps only errors, and otherwise `RUST_LOG` wins over the info default.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEBUG_FILTER: &str = "edgelab=debug,edgelab_cli=debug,edgelab_bundler=debug,edgelab_mock=debug";
const DEFAULT_FILTER: &str = "edgelab=info,edgelab_cli=info,edgelab_bundler=info,edgelab_mock=info";
const QUIET_FILTER: &str = "edgelab=error,edgelab_cli=error,edgelab_bundler=error,edgelab_mock=error";

/// Build the filter for the given flags.
pub fn filter_for(debug: bool, quiet: bool) -> EnvFilter {
    if debug {
        EnvFilter::new(DEBUG_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Initialize the global tracing subscriber. Call once, before any logging.
pub fn init_logger(debug: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    tracing_subscriber::registry()
        .with(filter_for(debug, quiet))
        .with(fmt_layer)
        .init();
}

/// Check if colored output should be enabled.
///
/// `NO_COLOR` disables colors, `FORCE_COLOR` forces them, otherwise the
/// terminal decides.
pub fn should_use_colors() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    console::Term::stdout().features().colors_supported()
}
