//! Interactive console: single-key shortcuts while a session runs.

use crate::ui;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleAction {
    OpenBrowser,
    OpenDevtools,
    Clear,
    Exit,
}

/// Map a pressed key to its action.
pub fn action_for_key(key: char) -> Option<ConsoleAction> {
    match key.to_ascii_lowercase() {
        'b' => Some(ConsoleAction::OpenBrowser),
        'd' => Some(ConsoleAction::OpenDevtools),
        'c' => Some(ConsoleAction::Clear),
        // Ctrl+C arrives as a character while the terminal is in raw mode
        'x' | 'q' | '\u{3}' => Some(ConsoleAction::Exit),
        _ => None,
    }
}

/// Shortcut legend printed once the session is up.
pub fn help_line() -> &'static str {
    "Press b to open a browser, d for devtools, c to clear, x to exit"
}

/// Start reading keys on a background thread.
///
/// Returns `None` when nobody is at the terminal (piped stdin, CI).
pub fn spawn_key_reader() -> Option<mpsc::Receiver<ConsoleAction>> {
    if !console::user_attended() || ui::is_ci() {
        return None;
    }

    let (tx, rx) = mpsc::channel(8);
    let spawned = std::thread::Builder::new()
        .name("edgelab-console".to_string())
        .spawn(move || {
            let term = console::Term::stdout();
            loop {
                let key = match term.read_char() {
                    Ok(key) => key,
                    Err(e) => {
                        tracing::debug!(error = %e, "console input closed");
                        break;
                    }
                };

                let Some(action) = action_for_key(key) else {
                    continue;
                };
                if tx.blocking_send(action).is_err() || action == ConsoleAction::Exit {
                    break;
                }
            }
        });

    match spawned {
        Ok(_) => Some(rx),
        Err(e) => {
            tracing::warn!(error = %e, "failed to start console input thread");
            None
        }
    }
}

/// Open `url` in the default browser.
///
/// Uses `open` on macOS, `start` on Windows and `xdg-open` elsewhere.
pub fn open_browser(url: &str) {
    use std::process::Command;

    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    match result {
        Ok(_) => ui::info(&format!("Opened browser at {}", url)),
        Err(e) => ui::warning(&format!("Failed to open browser: {}", e)),
    }
}

/// Devtools URLs cannot be opened from the command line; print where to go.
pub fn show_devtools(devtools_url: Option<&str>) {
    match devtools_url {
        Some(url) => {
            ui::info("Open chrome://inspect in a Chromium browser, or paste:");
            ui::info(url);
        }
        None => ui::warning(
            "No inspector port configured. Set dev.inspectPort to attach devtools (in-process runtime only)",
        ),
    }
}

pub fn clear_screen() {
    if let Err(e) = console::Term::stderr().clear_screen() {
        tracing::debug!(error = %e, "failed to clear screen");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_for_key() {
        assert_eq!(action_for_key('b'), Some(ConsoleAction::OpenBrowser));
        assert_eq!(action_for_key('B'), Some(ConsoleAction::OpenBrowser));
        assert_eq!(action_for_key('d'), Some(ConsoleAction::OpenDevtools));
        assert_eq!(action_for_key('c'), Some(ConsoleAction::Clear));
        assert_eq!(action_for_key('x'), Some(ConsoleAction::Exit));
        assert_eq!(action_for_key('q'), Some(ConsoleAction::Exit));
        assert_eq!(action_for_key('\u{3}'), Some(ConsoleAction::Exit));
        assert_eq!(action_for_key('z'), None);
        assert_eq!(action_for_key('\n'), None);
    }

    #[test]
    fn test_help_line_mentions_every_key() {
        let help = help_line();
        for key in ["b ", "d ", "c ", "x "] {
            assert!(help.contains(key), "{key}");
        }
    }
}
