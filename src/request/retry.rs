//! Retry policy, failure classification and the per-call retry state machine.
//!
//! Nothing here sleeps or touches the network: the executor feeds attempt
//! outcomes in and acts on the returned [`Step`].

use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use super::transport::TransportError;

/// Immutable retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: f64,
    jitter: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier: 2.0,
            jitter: Duration::ZERO,
            max_delay: Duration::from_secs(120),
        }
    }

    /// Single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    /// Deterministic part of the delay after the `attempt`-th failure
    /// (1-based): `base * multiplier^(attempt - 1)`, capped at `max_delay`.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Nominal delay shifted by a uniform sample in `[-jitter, +jitter]`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        let jitter = self.jitter.as_secs_f64();
        if jitter <= 0.0 {
            return nominal;
        }
        let offset = rand::thread_rng().gen_range(-jitter..=jitter);
        Duration::try_from_secs_f64((nominal.as_secs_f64() + offset).max(0.0))
            .unwrap_or(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

/// Why a single attempt did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("http status {status}: {snippet}")]
    Status { status: u16, snippet: String },
    #[error("unexpected content type {content_type:?} for status {status}")]
    UnexpectedContent {
        status: u16,
        content_type: Option<String>,
    },
}

impl AttemptFailure {
    pub fn status(&self) -> Option<u16> {
        match self {
            AttemptFailure::Transport(_) => None,
            AttemptFailure::Status { status, .. }
            | AttemptFailure::UnexpectedContent { status, .. } => Some(*status),
        }
    }
}

/// Failure category driving the retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Attributable to the proxy: evict it and try another one.
    Proxy,
    /// Remote or network hiccup: back off and retry.
    Transient,
    /// Retrying cannot help.
    Fatal,
}

/// Classify a failed attempt. `via_proxy` tells whether the attempt was routed
/// through a proxy.
pub fn classify(failure: &AttemptFailure, via_proxy: bool) -> FailureClass {
    match failure {
        AttemptFailure::Transport(err) => classify_transport(err),
        AttemptFailure::Status { status, .. } => classify_status(*status, via_proxy),
        AttemptFailure::UnexpectedContent { .. } => FailureClass::Fatal,
    }
}

pub fn classify_transport(err: &TransportError) -> FailureClass {
    match err {
        TransportError::Proxy(_) => FailureClass::Proxy,
        TransportError::Connect(_) | TransportError::Timeout | TransportError::Network(_) => {
            FailureClass::Transient
        }
        TransportError::InvalidRequest(_) => FailureClass::Fatal,
    }
}

pub fn classify_status(status: u16, via_proxy: bool) -> FailureClass {
    match status {
        407 if via_proxy => FailureClass::Proxy,
        429 | 500..=599 => FailureClass::Transient,
        _ => FailureClass::Fatal,
    }
}

/// Next action decided by [`RetryState`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Sleep for the delay, advance the pool cursor and try again.
    Retry { attempt: u32, delay: Duration },
    /// Evict the proxy that was used and try again without sleeping.
    Evict,
    /// Stop with the given outcome.
    Fail(Exhaustion),
}

/// Terminal reasons produced by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Exhaustion {
    Retries { attempts: u32, last: AttemptFailure },
    Proxies,
    Rejected(AttemptFailure),
}

/// Per-call bookkeeping: transient attempts and proxy failures draw from
/// separate budgets.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    max_proxy_failures: u32,
    attempts: u32,
    proxy_failures: u32,
}

impl RetryState {
    pub fn new(policy: RetryPolicy, max_proxy_failures: u32) -> Self {
        Self {
            policy,
            max_proxy_failures: max_proxy_failures.max(1),
            attempts: 0,
            proxy_failures: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn proxy_failures(&self) -> u32 {
        self.proxy_failures
    }

    /// Number of network exchanges made so far.
    pub fn exchanges(&self) -> u32 {
        self.attempts + self.proxy_failures
    }

    pub fn on_failure(&mut self, failure: AttemptFailure, via_proxy: bool) -> Step {
        match classify(&failure, via_proxy) {
            FailureClass::Proxy => {
                self.proxy_failures += 1;
                if self.proxy_failures > self.max_proxy_failures {
                    Step::Fail(Exhaustion::Proxies)
                } else {
                    Step::Evict
                }
            }
            FailureClass::Transient => {
                self.attempts += 1;
                if self.attempts >= self.policy.max_attempts() {
                    Step::Fail(Exhaustion::Retries {
                        attempts: self.attempts,
                        last: failure,
                    })
                } else {
                    Step::Retry {
                        attempt: self.attempts,
                        delay: self.policy.delay_for_attempt(self.attempts),
                    }
                }
            }
            FailureClass::Fatal => Step::Fail(Exhaustion::Rejected(failure)),
        }
    }
}
