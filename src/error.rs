//! Error taxonomy for the scrape/upload pipeline.
//!
//! Per-episode failures (a page missing its transcript, one lesson upload
//! rejected) are logged and skipped by the callers; the variants here cover
//! everything that propagates. Duplicate lessons are not errors at all;
//! skipping them is the expected dedup outcome.

use thiserror::Error;

/// Errors produced while scraping RFI or talking to the LingQ API.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport-level failure during scrape or upload.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A source page or API payload did not have the expected shape.
    #[error("failed to parse {0}")]
    Parse(String),

    /// Missing or rejected API token. Fatal before any lesson creation.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Non-auth HTTP error from the LingQ API.
    #[error("LingQ API returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Local store failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid environment or CLI configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let e = SyncError::Parse("listing page".to_string());
        assert_eq!(e.to_string(), "failed to parse listing page");
    }

    #[test]
    fn test_auth_error_display() {
        let e = SyncError::Auth("LINGQ_API_TOKEN is not set".to_string());
        assert!(e.to_string().contains("authentication failed"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: SyncError = io.into();
        assert!(matches!(e, SyncError::Io(_)));
    }
}
