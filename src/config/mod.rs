//! Settings and configuration module
//!
//! Provides the client configuration with:
//! - Defaults matching the provider's documented locale values
//! - JSON loading
//! - Validation before a client is built

pub mod config;

pub use config::{ConfigError, TrendsConfig};
