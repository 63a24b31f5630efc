use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::endpoints::Locale;
use crate::request::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Options recognised by the client. Durations are (fractional) seconds in
/// serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendsConfig {
    /// Interface language, e.g. `en-US`.
    pub hl: String,
    /// Timezone offset in minutes.
    pub tz: i32,
    /// Default geography for queries built through the client.
    pub geo: String,
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
    /// Per-attempt timeout.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Total attempt budget for transient failures; `0` behaves like `1`.
    pub retries: u32,
    /// Base backoff delay in seconds.
    pub backoff_factor: f64,
    pub backoff_multiplier: f64,
    #[serde(with = "duration_secs")]
    pub jitter: Duration,
    #[serde(with = "duration_secs")]
    pub max_delay: Duration,
    /// Outbound proxies in rotation order; empty means direct connection.
    pub proxies: Vec<String>,
    /// Proxy-layer failures tolerated per logical call. Defaults to the number
    /// of proxies.
    pub max_proxy_failures: Option<u32>,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            hl: "en-US".into(),
            tz: 360,
            geo: String::new(),
            connect_timeout: Duration::from_secs(2),
            timeout: Duration::from_secs(5),
            retries: 0,
            backoff_factor: 0.0,
            backoff_multiplier: 2.0,
            jitter: Duration::ZERO,
            max_delay: Duration::from_secs(120),
            proxies: Vec::new(),
            max_proxy_failures: None,
        }
    }
}

impl TrendsConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: TrendsConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hl.chars().count() < 2 {
            return Err(ConfigError::invalid("hl", "expected a locale such as en-US"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("timeout", "must be greater than zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::invalid("connect_timeout", "must be greater than zero"));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(ConfigError::invalid(
                "backoff_factor",
                format!("must be a non-negative number, got {}", self.backoff_factor),
            ));
        }
        if Duration::try_from_secs_f64(self.backoff_factor).is_err() {
            return Err(ConfigError::invalid(
                "backoff_factor",
                format!("{} seconds is out of range", self.backoff_factor),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "backoff_multiplier",
                format!("must be at least 1, got {}", self.backoff_multiplier),
            ));
        }
        if self.proxies.iter().any(|proxy| proxy.trim().is_empty()) {
            return Err(ConfigError::invalid("proxies", "entries must not be blank"));
        }
        Ok(())
    }

    pub fn locale(&self) -> Locale {
        Locale::new(self.hl.clone(), self.tz)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let base_delay =
            Duration::try_from_secs_f64(self.backoff_factor.max(0.0)).unwrap_or(self.max_delay);
        RetryPolicy::new(self.retries, base_delay)
            .with_multiplier(self.backoff_multiplier)
            .with_jitter(self.jitter)
            .with_max_delay(self.max_delay)
    }

    pub fn proxy_failure_budget(&self) -> u32 {
        self.max_proxy_failures
            .unwrap_or(self.proxies.len() as u32)
            .max(1)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
