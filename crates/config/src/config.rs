//! Gateway configuration
//!
//! [`GatewayConfig`] is the single source of truth for every tunable the
//! gateway exposes. It is plain data: `Clone + Send + Sync`, deserializable
//! from a partial JSON document (missing fields keep their defaults), and
//! convertible into the runtime configs of the rate limiter and retry policy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use storegate_core::{constants::*, Error, Result};
use storegate_utils::{RateLimitConfig, RetryConfig, WindowLimits, XdgPaths};

/// Complete gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
    pub request: RequestSettings,
    pub auth: AuthSettings,
    pub profile: ProfileSettings,
    pub storage: StorageSettings,
}

/// Response cache sizing and lifetimes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_size: usize,
    pub ttl_ms: u64,
    pub stale_ttl_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_CACHE_MAX_SIZE,
            ttl_ms: DEFAULT_CACHE_TTL_MS,
            stale_ttl_ms: DEFAULT_CACHE_STALE_TTL_MS,
        }
    }
}

/// Limits for one rate-limit key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSettings {
    pub max_requests: usize,
    pub time_window_ms: u64,
    pub burst_limit: usize,
}

impl From<WindowSettings> for WindowLimits {
    fn from(settings: WindowSettings) -> Self {
        WindowLimits {
            max_requests: settings.max_requests,
            time_window: Duration::from_millis(settings.time_window_ms),
            burst_limit: settings.burst_limit,
        }
    }
}

/// Admission control and backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_requests: usize,
    pub time_window_ms: u64,
    pub burst_limit: usize,
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_wait_ms: u64,
    pub max_wait_rounds: u32,
    pub overrides: BTreeMap<String, WindowSettings>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            AUTH_RATE_KEY.to_string(),
            WindowSettings {
                max_requests: AUTH_RATE_MAX_REQUESTS,
                time_window_ms: AUTH_RATE_TIME_WINDOW_MS,
                burst_limit: AUTH_RATE_MAX_REQUESTS,
            },
        );
        overrides.insert(
            FAVORITES_RATE_KEY.to_string(),
            WindowSettings {
                max_requests: FAVORITES_RATE_MAX_REQUESTS,
                time_window_ms: DEFAULT_RATE_TIME_WINDOW_MS,
                burst_limit: FAVORITES_RATE_MAX_REQUESTS,
            },
        );

        Self {
            max_requests: DEFAULT_RATE_MAX_REQUESTS,
            time_window_ms: DEFAULT_RATE_TIME_WINDOW_MS,
            burst_limit: DEFAULT_RATE_BURST_LIMIT,
            min_backoff_ms: DEFAULT_MIN_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            max_wait_ms: DEFAULT_RATE_MAX_WAIT_MS,
            max_wait_rounds: 32,
            overrides,
        }
    }
}

/// Network attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSettings {
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub max_concurrent: usize,
    pub jitter_factor: f64,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

/// Session credential handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub refresh_threshold_ms: u64,
    pub token_key: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            refresh_threshold_ms: DEFAULT_REFRESH_THRESHOLD_MS,
            token_key: TOKEN_STORAGE_KEY.to_string(),
        }
    }
}

/// Profile edit batching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub batch_delay_ms: u64,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            batch_delay_ms: DEFAULT_PROFILE_BATCH_DELAY_MS,
        }
    }
}

/// Durable state location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// State file; the XDG state directory is used when unset
    pub path: Option<PathBuf>,
}

impl StorageSettings {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(XdgPaths::state_file)
    }
}

impl GatewayConfig {
    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let cache = &self.cache;
        if cache.max_size == 0 {
            return Err(Error::configuration("cache.max_size must be greater than 0"));
        }
        if cache.ttl_ms == 0 {
            return Err(Error::configuration("cache.ttl_ms must be greater than 0"));
        }
        if cache.stale_ttl_ms < cache.ttl_ms {
            return Err(Error::configuration(format!(
                "cache.stale_ttl_ms ({}) must not be shorter than cache.ttl_ms ({})",
                cache.stale_ttl_ms, cache.ttl_ms
            )));
        }

        let rate = &self.rate_limit;
        validate_window(
            "rate_limit",
            WindowSettings {
                max_requests: rate.max_requests,
                time_window_ms: rate.time_window_ms,
                burst_limit: rate.burst_limit,
            },
        )?;
        for (key, window) in &rate.overrides {
            validate_window(&format!("rate_limit.overrides.{key}"), *window)?;
        }
        if rate.min_backoff_ms > rate.max_backoff_ms {
            return Err(Error::configuration(format!(
                "rate_limit.min_backoff_ms ({}) exceeds rate_limit.max_backoff_ms ({})",
                rate.min_backoff_ms, rate.max_backoff_ms
            )));
        }

        let request = &self.request;
        if request.base_url.trim().is_empty() {
            return Err(Error::configuration("request.base_url must not be empty"));
        }
        if request.timeout_ms == 0 {
            return Err(Error::configuration("request.timeout_ms must be greater than 0"));
        }
        if request.max_concurrent == 0 {
            return Err(Error::configuration(
                "request.max_concurrent must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&request.jitter_factor) {
            return Err(Error::configuration(
                "request.jitter_factor must be within 0.0..=1.0",
            ));
        }

        if self.auth.token_key.is_empty() {
            return Err(Error::configuration("auth.token_key must not be empty"));
        }

        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.ttl_ms)
    }

    pub fn cache_stale_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.stale_ttl_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request.timeout_ms)
    }

    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_millis(self.auth.refresh_threshold_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.profile.batch_delay_ms)
    }

    /// Runtime configuration for the rate limiter
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        let rate = &self.rate_limit;
        RateLimitConfig {
            limits: WindowLimits {
                max_requests: rate.max_requests,
                time_window: Duration::from_millis(rate.time_window_ms),
                burst_limit: rate.burst_limit,
            },
            min_backoff: Duration::from_millis(rate.min_backoff_ms),
            max_backoff: Duration::from_millis(rate.max_backoff_ms),
            max_wait: Duration::from_millis(rate.max_wait_ms),
            max_wait_rounds: rate.max_wait_rounds,
            overrides: rate
                .overrides
                .iter()
                .map(|(key, window)| (key.clone(), WindowLimits::from(*window)))
                .collect(),
        }
    }

    /// Runtime configuration for the retry policy
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.request.max_retries,
            min_backoff: Duration::from_millis(self.rate_limit.min_backoff_ms),
            max_backoff: Duration::from_millis(self.rate_limit.max_backoff_ms),
            jitter_factor: self.request.jitter_factor,
        }
    }
}

fn validate_window(section: &str, window: WindowSettings) -> Result<()> {
    if window.max_requests == 0 {
        return Err(Error::configuration(format!(
            "{section}.max_requests must be greater than 0"
        )));
    }
    if window.time_window_ms == 0 {
        return Err(Error::configuration(format!(
            "{section}.time_window_ms must be greater than 0"
        )));
    }
    if window.burst_limit < window.max_requests {
        return Err(Error::configuration(format!(
            "{section}.burst_limit ({}) must not be below max_requests ({})",
            window.burst_limit, window.max_requests
        )));
    }
    Ok(())
}
