//! Client and pool configuration structures.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::config::policy::{
    TimeoutPolicy, DEFAULT_TIMEOUT_MAX_OVERFLOW_SECS, DEFAULT_TIMEOUT_OVERFLOWS,
    DEFAULT_TIMEOUT_SECS,
};
use crate::core::AppResult;
use crate::util::clock::secs_f64;

/// Default broker frontend address.
pub const DEFAULT_ENDPOINT: &str = "ipc:///tmp/powerhose-front.ipc";
/// Default number of clients held by a pool.
pub const DEFAULT_POOL_SIZE: usize = 10;

const ENV_ENDPOINT: &str = "DISPATCH_ENDPOINT";
const ENV_TIMEOUT: &str = "DISPATCH_TIMEOUT_SECS";
const ENV_MAX_OVERFLOW: &str = "DISPATCH_TIMEOUT_MAX_OVERFLOW_SECS";
const ENV_OVERFLOWS: &str = "DISPATCH_TIMEOUT_OVERFLOWS";
const ENV_DEBUG: &str = "DISPATCH_DEBUG";
const ENV_POOL_SIZE: &str = "DISPATCH_POOL_SIZE";

/// Settings for a single client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Broker frontend address.
    pub endpoint: String,
    /// Base timeout in seconds.
    pub timeout_secs: f64,
    /// Maximum overflow timeout in seconds; must be >= `timeout_secs`.
    pub timeout_max_overflow_secs: f64,
    /// Consecutive overflows tolerated per worker before forcing a timeout.
    pub timeout_overflows: u32,
    /// Log the duration of every call.
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            timeout_max_overflow_secs: DEFAULT_TIMEOUT_MAX_OVERFLOW_SECS,
            timeout_overflows: DEFAULT_TIMEOUT_OVERFLOWS,
            debug: false,
        }
    }
}

impl ClientConfig {
    /// Configuration for `endpoint` with every other value defaulted.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Set the base and maximum overflow timeouts, in seconds.
    #[must_use]
    pub fn with_timeouts(mut self, timeout_secs: f64, max_overflow_secs: f64) -> Self {
        self.timeout_secs = timeout_secs;
        self.timeout_max_overflow_secs = max_overflow_secs;
        self
    }

    /// Set the overflow tolerance.
    #[must_use]
    pub fn with_timeout_overflows(mut self, overflows: u32) -> Self {
        self.timeout_overflows = overflows;
        self
    }

    /// Enable or disable duration logging.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Validate client configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.trim().is_empty() {
            return Err("endpoint must not be empty".into());
        }
        self.timeouts().map(|_| ())
    }

    /// Base and max-overflow timeouts as durations.
    fn timeouts(&self) -> Result<(Duration, Duration), String> {
        let base = secs_f64(self.timeout_secs).map_err(|e| format!("timeout_secs: {e}"))?;
        if base.is_zero() {
            return Err("timeout_secs must be a positive number".into());
        }
        let max_overflow = secs_f64(self.timeout_max_overflow_secs)
            .map_err(|e| format!("timeout_max_overflow_secs: {e}"))?;
        if max_overflow < base {
            return Err("timeout_max_overflow_secs must be >= timeout_secs".into());
        }
        Ok((base, max_overflow))
    }

    /// Timeout policy described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn policy(&self) -> Result<TimeoutPolicy, String> {
        self.validate()?;
        let (base, max_overflow) = self.timeouts()?;
        TimeoutPolicy::new(base, max_overflow, self.timeout_overflows)
    }

    /// Parse client configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from `DISPATCH_*` environment variables, reading a
    /// `.env` file first when one is present.
    ///
    /// # Errors
    ///
    /// Fails if a variable is present but unparsable, or validation fails.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut cfg = Self::default();
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            cfg.endpoint = endpoint;
        }
        if let Some(value) = parse_var(&lookup, ENV_TIMEOUT)? {
            cfg.timeout_secs = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_MAX_OVERFLOW)? {
            cfg.timeout_max_overflow_secs = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_OVERFLOWS)? {
            cfg.timeout_overflows = value;
        }
        if let Some(value) = lookup(ENV_DEBUG) {
            cfg.debug = matches!(value.trim(), "1" | "true" | "yes" | "on");
        }
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

/// Settings for a pool of clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of clients kept by the pool.
    #[serde(default = "default_pool_size")]
    pub size: usize,
    /// Settings shared by every pooled client.
    #[serde(flatten)]
    pub client: ClientConfig,
}

const fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            client: ClientConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Pool of `size` clients using `client` settings.
    #[must_use]
    pub fn new(size: usize, client: ClientConfig) -> Self {
        Self { size, client }
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.size == 0 {
            return Err("size must be greater than 0".into());
        }
        self.client.validate()
    }

    /// Parse pool configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from `DISPATCH_*` environment variables.
    ///
    /// # Errors
    ///
    /// Fails if a variable is present but unparsable, or validation fails.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let client = ClientConfig::from_lookup(&lookup)?;
        let size = parse_var(&lookup, ENV_POOL_SIZE)?.unwrap_or(DEFAULT_POOL_SIZE);
        let cfg = Self { size, client };
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} has invalid value `{raw}`"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_lookup_overrides_defaults() {
        let cfg = PoolConfig::from_lookup(lookup_from(&[
            ("DISPATCH_ENDPOINT", "tcp://127.0.0.1:5555"),
            ("DISPATCH_TIMEOUT_SECS", "2"),
            ("DISPATCH_TIMEOUT_MAX_OVERFLOW_SECS", "3.5"),
            ("DISPATCH_TIMEOUT_OVERFLOWS", "4"),
            ("DISPATCH_DEBUG", "true"),
            ("DISPATCH_POOL_SIZE", "3"),
        ]))
        .unwrap();
        assert_eq!(cfg.size, 3);
        assert_eq!(cfg.client.endpoint, "tcp://127.0.0.1:5555");
        assert!((cfg.client.timeout_max_overflow_secs - 3.5).abs() < f64::EPSILON);
        assert_eq!(cfg.client.timeout_overflows, 4);
        assert!(cfg.client.debug);
    }

    #[test]
    fn test_lookup_empty_uses_defaults() {
        let cfg = PoolConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg, PoolConfig::default());
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let err = ClientConfig::from_lookup(lookup_from(&[("DISPATCH_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("DISPATCH_TIMEOUT_SECS"));
    }

    #[test]
    fn test_lookup_rejects_inverted_timeouts() {
        assert!(ClientConfig::from_lookup(lookup_from(&[
            ("DISPATCH_TIMEOUT_SECS", "10"),
            ("DISPATCH_TIMEOUT_MAX_OVERFLOW_SECS", "2"),
        ]))
        .is_err());
    }

    #[test]
    fn test_lookup_rejects_unrepresentable_timeout() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("DISPATCH_TIMEOUT_SECS", "1e20"),
            ("DISPATCH_TIMEOUT_MAX_OVERFLOW_SECS", "1e20"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }
}
