//! Cache error taxonomy.

use thiserror::Error;

/// Cache client errors.
///
/// Every failure surfaces as one of these kinds. No operation retries
/// internally: each backend or codec failure is caught once, wrapped here,
/// and re-raised to the caller. Retry and backoff policy belongs to the
/// caller or a wrapping resilience layer.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Opening or closing the backend connection failed.
    #[error("Connection failed for {url}: {detail}")]
    Connection { url: String, detail: String },

    /// A value could not be converted to or from the wire format.
    ///
    /// `context` carries the offending type name (encode) or the raw wire
    /// text (decode); the underlying decoder error is never raised directly.
    #[error("Serialization failed for {context}: {detail}")]
    Serialization { context: String, detail: String },

    /// A cache operation failed against the backend.
    ///
    /// `detail` embeds the backend-qualified key and the underlying error
    /// text, so failures are diagnosable from logs alone.
    #[error("Cache operation `{operation}` failed: {detail}")]
    Operation {
        operation: &'static str,
        key: Option<String>,
        detail: String,
    },

    /// The requested capability is deliberately not implemented.
    #[error("{feature} not supported: {detail}")]
    Unsupported {
        feature: &'static str,
        detail: String,
    },
}
