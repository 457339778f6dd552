//! Error types for the candidate enrichment engine.
//!
//! Library crates use [`NdcError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all engine operations.
#[derive(Debug, thiserror::Error)]
pub enum NdcError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status (429 after retries included).
    #[error("upstream {url} returned [{status}] {body}")]
    Upstream {
        url: String,
        status: u16,
        body: String,
    },

    /// Upstream answered 2xx but the payload did not match the expected shape.
    #[error("schema mismatch from {url}: {message}")]
    Schema { url: String, message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// State blob could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A read was served before the candidate store was ever seeded.
    #[error("candidate store has not been seeded")]
    NotSeeded,

    /// Seeding was attempted and abandoned; nothing was committed.
    #[error("seeding failed: {0}")]
    SeedFailed(String),

    /// The engine task has shut down and no longer accepts requests.
    #[error("engine is no longer running")]
    EngineClosed,

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NdcError>;

impl NdcError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a schema mismatch error for the given upstream URL.
    pub fn schema(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Schema {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from an external data source.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Upstream { .. } | Self::Schema { .. }
        )
    }

    /// HTTP status the read/trigger surface reports for this error.
    ///
    /// Seeding failures are the caller's problem to retry (400); everything
    /// else, including reads before the first seed, is a server error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::SeedFailed(_) => 400,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = NdcError::config("missing base url");
        assert_eq!(err.to_string(), "config error: missing base url");

        let err = NdcError::Upstream {
            url: "https://api.example.com/x".into(),
            status: 503,
            body: "unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "upstream https://api.example.com/x returned [503] unavailable"
        );
    }

    #[test]
    fn upstream_classification() {
        assert!(NdcError::Network("reset".into()).is_upstream());
        assert!(NdcError::schema("u", "expected array").is_upstream());
        assert!(!NdcError::Storage("locked".into()).is_upstream());
        assert!(!NdcError::NotSeeded.is_upstream());
    }

    #[test]
    fn status_codes() {
        assert_eq!(NdcError::SeedFailed("boom".into()).status_code(), 400);
        assert_eq!(NdcError::NotSeeded.status_code(), 500);
        assert_eq!(NdcError::schema("u", "m").status_code(), 500);
    }
}
