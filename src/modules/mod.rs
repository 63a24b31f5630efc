//! Shared stateful services
//!
//! Proxy rotation, the session cookie store and the event hooks. Each is
//! internally synchronised and owned by one client instance.

pub mod events;
pub mod proxy;
pub mod session;

// Re-export commonly used types
pub use events::{
    EventDispatcher, EventHandler, EvictionEvent, LoggingHandler, RequestEvent, ResponseEvent,
    RetryEvent, SessionEvent, TrendsEvent,
};
pub use proxy::{ProxyExhausted, ProxyHealthReport, ProxyPool, ProxyStats};
pub use session::{Session, SessionStore};
