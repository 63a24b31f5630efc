//! Round-robin proxy pool with permanent eviction.
//!
//! The cursor always points at the proxy the *next* request should use.
//! Advancing spreads load and happens after every attempt; eviction removes a
//! proxy for good once a failure is attributed to the proxy itself.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use thiserror::Error;

/// Raised once an explicitly configured proxy list has been fully evicted.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("all configured proxies have been evicted")]
pub struct ProxyExhausted;

#[derive(Debug, Clone)]
pub struct ProxyHealthReport {
    pub total_proxies: usize,
    pub active_proxies: usize,
    pub evicted_proxies: usize,
    pub details: HashMap<String, ProxyStats>,
}

#[derive(Debug, Clone, Default)]
pub struct ProxyStats {
    pub successes: u64,
    pub failures: u64,
    pub last_used: Option<Instant>,
    pub last_failure: Option<Instant>,
}

#[derive(Debug, Clone)]
struct ProxyEntry {
    endpoint: String,
    stats: ProxyStats,
}

#[derive(Debug, Default)]
struct PoolState {
    active: Vec<ProxyEntry>,
    evicted: Vec<ProxyEntry>,
    cursor: usize,
}

impl PoolState {
    fn find_mut(&mut self, proxy: &str) -> Option<&mut ProxyEntry> {
        self.active
            .iter_mut()
            .chain(self.evicted.iter_mut())
            .find(|entry| entry.endpoint == proxy)
    }
}

/// Shared proxy pool. All operations take `&self` and are safe to call from
/// concurrent tasks.
#[derive(Debug)]
pub struct ProxyPool {
    explicit: bool,
    state: Mutex<PoolState>,
}

impl ProxyPool {
    /// Pool over the given endpoints, deduplicated, order preserved. An empty
    /// list yields a direct-connection pool.
    pub fn new<I>(proxies: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut active: Vec<ProxyEntry> = Vec::new();
        for proxy in proxies {
            let endpoint = proxy.into();
            if active.iter().any(|entry| entry.endpoint == endpoint) {
                continue;
            }
            active.push(ProxyEntry {
                endpoint,
                stats: ProxyStats::default(),
            });
        }

        Self {
            explicit: !active.is_empty(),
            state: Mutex::new(PoolState {
                active,
                evicted: Vec::new(),
                cursor: 0,
            }),
        }
    }

    /// Pool that always connects directly.
    pub fn direct() -> Self {
        Self::new(Vec::<String>::new())
    }

    /// Whether an explicit proxy list was supplied.
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Proxy under the cursor; `Ok(None)` means direct connection.
    pub fn current(&self) -> Result<Option<String>, ProxyExhausted> {
        let state = self.state.lock().expect("proxy pool lock poisoned");
        match state.active.get(state.cursor) {
            Some(entry) => Ok(Some(entry.endpoint.clone())),
            None if self.explicit => Err(ProxyExhausted),
            None => Ok(None),
        }
    }

    /// Move the cursor one step, wrapping around.
    pub fn advance(&self) {
        let mut state = self.state.lock().expect("proxy pool lock poisoned");
        let len = state.active.len();
        if len > 0 {
            state.cursor = (state.cursor + 1) % len;
        }
    }

    /// Permanently remove `proxy`. Returns `false` when it was not active,
    /// e.g. because a concurrent caller evicted it first.
    pub fn evict(&self, proxy: &str) -> bool {
        let mut state = self.state.lock().expect("proxy pool lock poisoned");
        let Some(index) = state
            .active
            .iter()
            .position(|entry| entry.endpoint == proxy)
        else {
            return false;
        };

        let mut entry = state.active.remove(index);
        entry.stats.failures += 1;
        entry.stats.last_failure = Some(Instant::now());
        state.evicted.push(entry);

        // Keep the cursor on the element that followed the evicted one.
        if index < state.cursor {
            state.cursor -= 1;
        }
        if state.cursor >= state.active.len() {
            state.cursor = 0;
        }
        true
    }

    pub fn record_success(&self, proxy: &str) {
        let mut state = self.state.lock().expect("proxy pool lock poisoned");
        if let Some(entry) = state.find_mut(proxy) {
            entry.stats.successes += 1;
            entry.stats.last_used = Some(Instant::now());
        }
    }

    pub fn record_failure(&self, proxy: &str) {
        let mut state = self.state.lock().expect("proxy pool lock poisoned");
        if let Some(entry) = state.find_mut(proxy) {
            entry.stats.failures += 1;
            entry.stats.last_used = Some(Instant::now());
            entry.stats.last_failure = Some(Instant::now());
        }
    }

    /// Number of active proxies.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .expect("proxy pool lock poisoned")
            .active
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once every explicitly configured proxy has been evicted.
    pub fn is_exhausted(&self) -> bool {
        self.explicit && self.is_empty()
    }

    /// Active endpoints in rotation order, starting from index 0.
    pub fn endpoints(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("proxy pool lock poisoned")
            .active
            .iter()
            .map(|entry| entry.endpoint.clone())
            .collect()
    }

    pub fn health_report(&self) -> ProxyHealthReport {
        let state = self.state.lock().expect("proxy pool lock poisoned");
        let details = state
            .active
            .iter()
            .chain(state.evicted.iter())
            .map(|entry| (entry.endpoint.clone(), entry.stats.clone()))
            .collect();

        ProxyHealthReport {
            total_proxies: state.active.len() + state.evicted.len(),
            active_proxies: state.active.len(),
            evicted_proxies: state.evicted.len(),
            details,
        }
    }
}

impl Default for ProxyPool {
    fn default() -> Self {
        Self::direct()
    }
}
