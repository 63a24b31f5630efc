//! Crate-level error surfaced by every public operation.

use thiserror::Error;

use crate::config::ConfigError;
use crate::request::AttemptFailure;

/// Result alias used across the orchestration layer.
pub type TrendsResult<T> = Result<T, TrendsError>;

/// Terminal outcome of a failed logical operation.
#[derive(Debug, Error)]
pub enum TrendsError {
    #[error("session acquisition failed: {0}")]
    SessionAcquisitionFailed(String),
    #[error("token negotiation failed: {0}")]
    TokenNegotiationFailed(String),
    #[error("no usable proxy remains")]
    ProxyExhausted,
    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: AttemptFailure,
    },
    #[error("request rejected: {0}")]
    NonRetryableRequestRejected(#[source] AttemptFailure),
    #[error("operation cancelled")]
    Cancelled,
    #[error("invalid query: {0}")]
    InvalidQuerySpec(String),
    #[error("malformed response body: {0}")]
    MalformedResponse(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl TrendsError {
    /// HTTP status carried by the underlying failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TrendsError::RetriesExhausted { last, .. } => last.status(),
            TrendsError::NonRetryableRequestRejected(failure) => failure.status(),
            _ => None,
        }
    }
}
