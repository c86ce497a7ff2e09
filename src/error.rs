//! Error types for arxiv-monitor.
//!
//! Every fallible library function returns `Result<T, MonitorError>`. Most of
//! these errors never reach the binary: the fetchers and the page stream absorb
//! them into degraded results and log them instead.

use std::time::Duration;
use thiserror::Error;

/// Main error type for arxiv-monitor operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Network/HTTP transport error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote API answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Http {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Rate limited by an external API (HTTP 429)
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Value of the `Retry-After` header, when the server sent one
        retry_after: Option<Duration>,
    },

    /// A page after the first one came back without entries
    #[error("Unexpected empty page at offset {offset}")]
    EmptyPage {
        /// Offset of the page that was requested
        offset: usize,
    },

    /// Feed or payload could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// A feed entry lacks a field every paper must have
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl MonitorError {
    /// Errors raised by the HTTP layer itself. Local I/O and parse failures
    /// are not in this set.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Http { .. } | Self::RateLimited { .. } | Self::EmptyPage { .. }
        )
    }

    /// True for the distinguished HTTP 429 condition.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Result type alias using `MonitorError`
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a missing-field error
    fn ok_or_missing(self, field: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_missing(self, field: &'static str) -> Result<T> {
        self.ok_or(MonitorError::MissingField(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(MonitorError::RateLimited { retry_after: None }.is_transient());
        assert!(MonitorError::EmptyPage { offset: 100 }.is_transient());
        assert!(MonitorError::Http {
            status: 503,
            url: "https://example.org".to_string()
        }
        .is_transient());
        assert!(!MonitorError::Parse("bad".to_string()).is_transient());
        assert!(!MonitorError::MissingField("title").is_transient());
    }

    #[test]
    fn test_ok_or_missing() {
        let value: Option<u8> = None;
        let err = value.ok_or_missing("updated").expect_err("should be missing");
        assert_eq!(err.to_string(), "Missing field: updated");
    }
}
