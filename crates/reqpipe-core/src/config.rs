//! Client and per-request configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryConfig;
use crate::transport::DEFAULT_TIMEOUT;

/// Configuration problems detected at construction time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base URL cannot be empty")]
    EmptyBaseUrl,
    #[error("base URL must start with http:// or https://: '{value}'")]
    InvalidBaseUrl { value: String },
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("cache capacity must be greater than zero")]
    ZeroCacheCapacity,
}

/// Client-wide pipeline configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub retry: RetryConfig,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url: String = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidBaseUrl { value: base_url });
        }

        Ok(Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("reqpipe/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryConfig::default(),
            cache_capacity: 100,
            cache_ttl: Duration::from_secs(300),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.timeout = timeout;
        Ok(self)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, capacity: usize, ttl: Duration) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }
        self.cache_capacity = capacity;
        self.cache_ttl = ttl;
        Ok(self)
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Per-call request options with documented defaults.
///
/// | Field | Default | Meaning |
/// |-------|---------|---------|
/// | `key` | method + path | request identity for cancel/loading/retry |
/// | `query` | empty | query pairs appended to the URL |
/// | `cache` | `false` | serve/fill the GET cache |
/// | `cache_ttl` | client default | per-entry TTL override |
/// | `silent` | `false` | skip error handling side effects |
/// | `loading` | `true` | track the request in the loading state |
/// | `retry` | `true` | allow automatic retry for eligible failures |
/// | `headers` | empty | extra request headers |
/// | `timeout` | client default | per-request deadline override |
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub key: Option<String>,
    pub query: Vec<(String, String)>,
    pub cache: bool,
    pub cache_ttl: Option<Duration>,
    pub silent: bool,
    pub headers: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    no_loading: bool,
    no_retry: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Serve fresh cache hits and fill the cache on success (GET only).
    pub fn cached(mut self) -> Self {
        self.cache = true;
        self
    }

    pub fn cached_for(mut self, ttl: Duration) -> Self {
        self.cache = true;
        self.cache_ttl = Some(ttl);
        self
    }

    /// Reject failures without logging, listener notification or
    /// user-facing messages.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn without_loading(mut self) -> Self {
        self.no_loading = true;
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.no_retry = true;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub const fn loading_enabled(&self) -> bool {
        !self.no_loading
    }

    pub const fn retry_enabled(&self) -> bool {
        !self.no_retry
    }
}
