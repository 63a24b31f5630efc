//! Transport seam used by the executor.
//!
//! The executor never talks to reqwest directly: everything goes through
//! [`TrendsTransport`], which keeps retry/failover logic testable against a
//! scripted in-memory transport.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{TransportRequest, TransportResponse};

/// Contract that abstracts the underlying HTTP transport.
///
/// `proxy` is the endpoint the exchange must be routed through, or `None` for
/// a direct connection. Implementations perform exactly one network exchange
/// per call and must not retry internally.
#[async_trait]
pub trait TrendsTransport: Send + Sync {
    async fn send(
        &self,
        request: &TransportRequest,
        proxy: Option<&str>,
    ) -> Result<TransportResponse, TransportError>;
}

/// Failures below the HTTP status layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The proxy itself could not be reached or refused to relay.
    #[error("proxy failure: {0}")]
    Proxy(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
