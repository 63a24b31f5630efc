//! Resilient request execution.
//!
//! One call to [`RequestExecutor::execute`] is one logical request: it selects
//! a proxy, performs a single exchange with a per-attempt timeout and feeds
//! the outcome into [`RetryState`] until the request succeeds or a terminal
//! outcome is reached.
//!
//! Attempt loop:
//! 1. Pick the proxy under the pool cursor (or go direct).
//! 2. Send, bounded by the attempt timeout and the cancellation token.
//! 3. On success advance the cursor and return.
//! 4. On a proxy failure evict that proxy and re-select without sleeping.
//! 5. On a transient failure back off, advance the cursor and retry.
//! 6. Anything else fails immediately.

use std::sync::Arc;
use std::time::{Duration, Instant};

use http::HeaderMap;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::error::{TrendsError, TrendsResult};
use crate::modules::events::{
    EventDispatcher, EvictionEvent, RequestEvent, ResponseEvent, RetryEvent, TrendsEvent,
};
use crate::modules::proxy::ProxyPool;

use super::retry::{AttemptFailure, Exhaustion, RetryPolicy, RetryState, Step};
use super::transport::{TransportError, TrendsTransport};
use super::types::{Expect, RequestSpec, TransportResponse};

const SNIPPET_LIMIT: usize = 200;

/// Shared executor; cheap to share behind an `Arc` across tasks.
pub struct RequestExecutor {
    transport: Arc<dyn TrendsTransport>,
    pool: Arc<ProxyPool>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    max_proxy_failures: u32,
    events: Arc<EventDispatcher>,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn TrendsTransport>,
        pool: Arc<ProxyPool>,
        policy: RetryPolicy,
    ) -> Self {
        let max_proxy_failures = pool.len().max(1) as u32;
        Self {
            transport,
            pool,
            policy,
            attempt_timeout: Duration::from_secs(5),
            max_proxy_failures,
            events: Arc::new(EventDispatcher::with_logging()),
        }
    }

    pub fn with_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub fn with_max_proxy_failures(mut self, max: u32) -> Self {
        self.max_proxy_failures = max.max(1);
        self
    }

    pub fn with_events(mut self, events: Arc<EventDispatcher>) -> Self {
        self.events = events;
        self
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    /// Execute `spec`, adding `extra_headers` (cookies, locale) to every
    /// attempt.
    pub async fn execute(
        &self,
        spec: &RequestSpec,
        extra_headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> TrendsResult<TransportResponse> {
        let request = spec.to_transport(extra_headers);
        let mut state = RetryState::new(self.policy.clone(), self.max_proxy_failures);

        loop {
            if cancel.is_cancelled() {
                return Err(TrendsError::Cancelled);
            }

            let proxy = self
                .pool
                .current()
                .map_err(|_| TrendsError::ProxyExhausted)?;

            self.events.dispatch(TrendsEvent::Request(RequestEvent {
                url: request.url.clone(),
                method: request.method.clone(),
                proxy: proxy.clone(),
                attempt: state.exchanges() + 1,
                timestamp: chrono::Utc::now(),
            }));

            let started = Instant::now();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(TrendsError::Cancelled),
                result = timeout(
                    self.attempt_timeout,
                    self.transport.send(&request, proxy.as_deref()),
                ) => result.unwrap_or(Err(TransportError::Timeout)),
            };
            let latency = started.elapsed();

            let failure = match outcome {
                Ok(response) => {
                    self.events.dispatch(TrendsEvent::Response(ResponseEvent {
                        url: response.url.clone(),
                        method: request.method.clone(),
                        proxy: proxy.clone(),
                        status: response.status,
                        latency,
                        timestamp: chrono::Utc::now(),
                    }));
                    match check_response(&response, spec.expect) {
                        None => {
                            if let Some(ref endpoint) = proxy {
                                self.pool.record_success(endpoint);
                            }
                            self.pool.advance();
                            return Ok(response);
                        }
                        Some(failure) => failure,
                    }
                }
                Err(err) => AttemptFailure::Transport(err),
            };

            match state.on_failure(failure.clone(), proxy.is_some()) {
                Step::Evict => {
                    if let Some(ref endpoint) = proxy {
                        self.evict(endpoint, &failure);
                    }
                }
                Step::Retry { attempt, delay } => {
                    if let Some(ref endpoint) = proxy {
                        self.pool.record_failure(endpoint);
                    }
                    self.events.dispatch(TrendsEvent::Retry(RetryEvent {
                        url: request.url.clone(),
                        attempt: attempt + 1,
                        reason: failure.to_string(),
                        scheduled_after: delay,
                        timestamp: chrono::Utc::now(),
                    }));
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(TrendsError::Cancelled),
                        _ = sleep(delay) => {}
                    }
                    self.pool.advance();
                }
                Step::Fail(exhaustion) => {
                    if let Some(ref endpoint) = proxy {
                        // a dead proxy leaves the pool even when the budget is spent
                        if matches!(exhaustion, Exhaustion::Proxies) {
                            self.evict(endpoint, &failure);
                        } else {
                            self.pool.record_failure(endpoint);
                        }
                    }
                    return Err(match exhaustion {
                        Exhaustion::Retries { attempts, last } => {
                            TrendsError::RetriesExhausted { attempts, last }
                        }
                        Exhaustion::Proxies => TrendsError::ProxyExhausted,
                        Exhaustion::Rejected(failure) => {
                            TrendsError::NonRetryableRequestRejected(failure)
                        }
                    });
                }
            }
        }
    }

    fn evict(&self, endpoint: &str, failure: &AttemptFailure) {
        if self.pool.evict(endpoint) {
            self.events.dispatch(TrendsEvent::ProxyEvicted(EvictionEvent {
                proxy: endpoint.to_string(),
                reason: failure.to_string(),
                remaining: self.pool.len(),
                timestamp: chrono::Utc::now(),
            }));
        }
    }
}

/// `None` when the response counts as a success for `expect`.
fn check_response(response: &TransportResponse, expect: Expect) -> Option<AttemptFailure> {
    if !(200..300).contains(&response.status) {
        return Some(AttemptFailure::Status {
            status: response.status,
            snippet: snippet(&response.text()),
        });
    }
    if expect == Expect::Json && !response.is_json_like() {
        return Some(AttemptFailure::UnexpectedContent {
            status: response.status,
            content_type: response.content_type().map(str::to_string),
        });
    }
    None
}

fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_LIMIT).collect()
}
