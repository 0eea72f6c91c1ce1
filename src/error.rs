//! Error types for the pdfknow library.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for pdfknow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an operation.
///
/// Recoverable conditions (a page that fails to decode, a ragged table,
/// a malformed model response) are not reported through this type; they
/// surface as [`ExtractionWarning`](crate::model::ExtractionWarning)s on the
/// document's report instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file format is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// A single page could not be decoded.
    #[error("Page {page} could not be decoded: {reason}")]
    PageDecode { page: u32, reason: String },

    /// A detected table region does not form a valid grid.
    #[error("Table on page {page} is not grid-aligned: {reason}")]
    TableGrid { page: u32, reason: String },

    /// The generative model call failed.
    #[error("Model call failed: {0}")]
    ModelCall(#[from] ModelCallError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The batch was cancelled before this document started.
    #[error("Cancelled before processing started")]
    Cancelled,

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

/// Failures surfaced by the model-call boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelCallError {
    /// Quota or rate limit exceeded.
    #[error("rate limited{}", retry_after.map(|d| format!(" (retry after {}s)", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// The call did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Missing or rejected credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service answered with a payload that has no text candidate.
    #[error("invalid response envelope: {0}")]
    InvalidResponse(String),
}

impl ModelCallError {
    /// Whether the failure is worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelCallError::RateLimited { .. }
            | ModelCallError::Timeout(_)
            | ModelCallError::Network(_) => true,
            ModelCallError::Http { status, .. } => *status >= 500,
            ModelCallError::Auth(_) | ModelCallError::InvalidResponse(_) => false,
        }
    }

    /// Server-provided retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ModelCallError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Encrypted;
        assert_eq!(err.to_string(), "Document is encrypted");

        let err = Error::PageDecode {
            page: 3,
            reason: "bad stream".to_string(),
        };
        assert_eq!(err.to_string(), "Page 3 could not be decoded: bad stream");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_model_error_retryable() {
        assert!(ModelCallError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(ModelCallError::RateLimited { retry_after: None }.is_retryable());
        assert!(ModelCallError::Network("reset".into()).is_retryable());
        assert!(ModelCallError::Http {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!ModelCallError::Http {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!ModelCallError::Auth("no key".into()).is_retryable());
    }

    #[test]
    fn test_rate_limited_display() {
        let err = ModelCallError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(err.to_string(), "rate limited (retry after 7s)");
        let err = ModelCallError::RateLimited { retry_after: None };
        assert_eq!(err.to_string(), "rate limited");
    }
}
