//! Event system for request orchestration.
//!
//! Provides hooks for logging and custom reactions around attempts, retries,
//! proxy evictions and session acquisition.

use chrono::{DateTime, Utc};
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Emitted right before an attempt goes on the wire.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub url: Url,
    pub method: Method,
    pub proxy: Option<String>,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
}

/// Emitted for every HTTP response received, successful or not.
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub url: Url,
    pub method: Method,
    pub proxy: Option<String>,
    pub status: u16,
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RetryEvent {
    pub url: Url,
    pub attempt: u32,
    pub reason: String,
    pub scheduled_after: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EvictionEvent {
    pub proxy: String,
    pub reason: String,
    pub remaining: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub cookie_names: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum TrendsEvent {
    Request(RequestEvent),
    Response(ResponseEvent),
    Retry(RetryEvent),
    ProxyEvicted(EvictionEvent),
    SessionAcquired(SessionEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &TrendsEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Dispatcher with [`LoggingHandler`] already registered.
    pub fn with_logging() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register_handler(Arc::new(LoggingHandler));
        dispatcher
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: TrendsEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &TrendsEvent) {
        match event {
            TrendsEvent::Request(req) => {
                log::debug!(
                    "-> {} {} via {} (attempt {})",
                    req.method,
                    req.url,
                    req.proxy.as_deref().unwrap_or("direct"),
                    req.attempt
                );
            }
            TrendsEvent::Response(resp) => {
                log::debug!(
                    "<- {} {} -> {} ({:.2}s)",
                    resp.method,
                    resp.url,
                    resp.status,
                    resp.latency.as_secs_f64()
                );
            }
            TrendsEvent::Retry(retry) => {
                log::info!(
                    "retry {} attempt {} after {:.2}s: {}",
                    retry.url,
                    retry.attempt,
                    retry.scheduled_after.as_secs_f64(),
                    retry.reason
                );
            }
            TrendsEvent::ProxyEvicted(evicted) => {
                log::warn!(
                    "evicted proxy {} ({}), {} remaining",
                    evicted.proxy,
                    evicted.reason,
                    evicted.remaining
                );
            }
            TrendsEvent::SessionAcquired(session) => {
                log::info!("session acquired with cookies {:?}", session.cookie_names);
            }
        }
    }
}
