//! Pre-rebuild refresh command.
//!
//! Runs without a shell: the command line is split on whitespace and
//! anything that looks like shell syntax is rejected up front.

use crate::error::RefreshError;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Characters that only make sense to a shell.
pub const DENIED_CHARS: &[char] = &[
    ';', '&', '|', '`', '$', '>', '<', '(', ')', '{', '}', '\n', '\r',
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCommand {
    raw: String,
    program: String,
    args: Vec<String>,
}

impl RefreshCommand {
    /// Split a refresh command into program and arguments.
    ///
    /// No shell is involved, so metacharacters are refused outright.
    ///
    /// # Examples
    ///
    /// ```
    /// use edgelab_cli::dev::RefreshCommand;
    ///
    /// let command = RefreshCommand::parse("npm run build").unwrap();
    /// assert_eq!(command.program(), "npm");
    /// assert_eq!(command.args(), ["run", "build"]);
    ///
    /// assert!(RefreshCommand::parse("npm run build && rm -rf dist").is_err());
    /// assert!(RefreshCommand::parse("   ").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, RefreshError> {
        if let Some(ch) = raw.chars().find(|c| DENIED_CHARS.contains(c)) {
            return Err(RefreshError::Disallowed {
                command: raw.to_string(),
                ch,
            });
        }

        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(RefreshError::Empty)?;

        Ok(Self {
            raw: raw.trim().to_string(),
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run to completion in `cwd`, inheriting stdout and stderr.
    pub async fn run(&self, cwd: &Path) -> Result<(), RefreshError> {
        tracing::debug!(command = %self.raw, "running refresh command");

        let status = Command::new(&self.program)
            .args(&self.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| RefreshError::Spawn {
                command: self.raw.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(RefreshError::Failed {
                command: self.raw.clone(),
                status: status.to_string(),
            })
        }
    }
}

impl std::fmt::Display for RefreshCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
