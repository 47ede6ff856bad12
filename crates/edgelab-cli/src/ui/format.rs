//! Formatting utilities for durations and request log lines.

use owo_colors::{AnsiColors, OwoColorize};
use std::time::Duration;

/// Format duration in human-readable format.
///
/// ```
/// use std::time::Duration;
/// use edgelab_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    }
}

/// Color for an HTTP status class.
pub fn status_color(status: u16) -> AnsiColors {
    match status {
        200..=299 => AnsiColors::Green,
        300..=399 => AnsiColors::Cyan,
        400..=499 => AnsiColors::Yellow,
        _ => AnsiColors::Red,
    }
}

/// `GET /path 200 12ms`, with the status colored by class.
pub fn format_request_line(method: &str, path: &str, status: u16, elapsed: Duration) -> String {
    format!(
        "{} {} {} {}",
        method.bold(),
        path,
        status.color(status_color(status)),
        format_duration(elapsed).dimmed()
    )
}
