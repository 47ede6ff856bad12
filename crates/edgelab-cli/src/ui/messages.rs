//! Status message functions for terminal output.

use owo_colors::OwoColorize;

pub fn success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
}

pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

/// Print a debug message (only if `RUST_LOG` is set).
pub fn debug(message: &str) {
    if std::env::var("RUST_LOG").is_ok() {
        eprintln!("{} {}", "◆".dimmed(), message.dimmed());
    }
}

/// Print one proxied request line.
pub fn request(line: &str) {
    eprintln!("{} {}", "→".dimmed(), line);
}

/// Print one line of runtime output, tagged with its stream.
pub fn runtime_output(stream: &str, line: &str) {
    if stream == "stderr" {
        eprintln!("{} {}", format!("[{stream}]").red(), line);
    } else {
        eprintln!("{} {}", format!("[{stream}]").dimmed(), line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_messages() {
        success("Success message");
        info("Info message");
        warning("Warning message");
        error("Error message");
        debug("Debug message");
        request("GET / 200");
        runtime_output("stdout", "hello");
        runtime_output("stderr", "oops");
    }
}
