//! Error types for the mock platform services.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the mock Cache and KV services.
#[derive(Debug, Error)]
pub enum MockError {
    /// `get` was called with a decoding the KV API does not support.
    #[error("Unsupported KV get type '{0}'\n\nHint: Use one of 'text', 'json', 'arrayBuffer'")]
    UnsupportedType(String),

    /// Stored value could not be decoded as JSON.
    #[error("Value for key '{key}' is not valid JSON: {source}")]
    InvalidJson {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A `put` payload did not match its declared kind.
    #[error("Invalid KV value: {0}")]
    InvalidValue(String),

    /// The namespace map could not be written back to disk.
    #[error("Failed to persist KV store to {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Seed file exists but could not be read or parsed.
    #[error("Failed to load KV seed file {}: {reason}", .path.display())]
    Seed { path: PathBuf, reason: String },

    /// JSON serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Control server I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for mock service operations.
pub type Result<T, E = MockError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_type_has_hint() {
        let msg = MockError::UnsupportedType("stream".to_string()).to_string();
        assert!(msg.contains("'stream'"));
        assert!(msg.contains("Hint:"));
    }

    #[test]
    fn test_persist_error_mentions_path() {
        let err = MockError::Persist {
            path: PathBuf::from(".dev/kv.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains(".dev/kv.json"));
    }
}
