//! # trendscraper-rs
//!
//! A resilient async client for the unofficial Google Trends API.
//!
//! The provider is stateful and throttles aggressively: every data call needs a
//! session cookie and a short-lived widget token, and IP-based rate limiting
//! makes proxy rotation a practical necessity. This crate handles that
//! plumbing and hands back the raw JSON bodies.
//!
//! ## Features
//!
//! - Lazy, single-flight session cookie acquisition
//! - Per-query widget token negotiation
//! - Bounded retries with exponential backoff and jitter
//! - Round-robin proxy rotation with eviction of dead proxies
//! - Cooperative cancellation of in-flight operations
//!
//! ## Example
//!
//! ```no_run
//! use trendscraper_rs::TrendsClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TrendsClient::builder().with_retries(3).with_backoff_factor(0.5).build()?;
//!     let query = client.query(["pizza", "bagel"]).build()?;
//!     let tokens = client.negotiate(&query).await?;
//!     let body = client.interest_over_time(&tokens).await?;
//!     println!("{body}");
//!     Ok(())
//! }
//! ```

mod error;
mod trends;

pub mod config;
pub mod endpoints;
pub mod modules;
pub mod query;
pub mod request;
pub mod tokens;

pub use crate::error::{TrendsError, TrendsResult};
pub use crate::trends::{RelatedResult, TrendsClient, TrendsClientBuilder};

pub use crate::config::{ConfigError, TrendsConfig};

pub use crate::endpoints::{EndpointRequest, Locale, RegionOptions, Resolution};

pub use crate::query::{Property, QuerySpec, QuerySpecBuilder, Timeframe};

pub use crate::request::{
    AttemptFailure,
    Expect,
    RequestExecutor,
    RequestSpec,
    ReqwestTransport,
    RetryPolicy,
    TransportError,
    TransportRequest,
    TransportResponse,
    TrendsTransport,
};

pub use crate::tokens::{TokenNegotiator, TokenSet, Widget};

pub use crate::modules::{
    EventDispatcher,
    EventHandler,
    EvictionEvent,
    LoggingHandler,
    ProxyExhausted,
    ProxyHealthReport,
    ProxyPool,
    ProxyStats,
    RequestEvent,
    ResponseEvent,
    RetryEvent,
    Session,
    SessionEvent,
    SessionStore,
    TrendsEvent,
};

pub use tokio_util::sync::CancellationToken;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
