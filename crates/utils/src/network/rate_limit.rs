use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use storegate_core::{
    Error, Priority, Result, AUTH_RATE_KEY, AUTH_RATE_MAX_REQUESTS, AUTH_RATE_TIME_WINDOW_MS,
    DEFAULT_MAX_BACKOFF_MS, DEFAULT_MIN_BACKOFF_MS, DEFAULT_RATE_BURST_LIMIT,
    DEFAULT_RATE_MAX_REQUESTS, DEFAULT_RATE_MAX_WAIT_MS, DEFAULT_RATE_TIME_WINDOW_MS,
    FAVORITES_RATE_KEY, FAVORITES_RATE_MAX_REQUESTS,
};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Admission ceiling for one rate-limit key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimits {
    /// Admissions per window for default-priority callers
    pub max_requests: usize,
    /// Length of the sliding window
    pub time_window: Duration,
    /// Admissions per window for elevated-priority callers
    pub burst_limit: usize,
}

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Limits applied to keys without an override
    pub limits: WindowLimits,
    /// Backoff floor, also the value restored on success
    pub min_backoff: Duration,
    /// Backoff ceiling
    pub max_backoff: Duration,
    /// Longest single suspension while waiting for a slot
    pub max_wait: Duration,
    /// Suspensions allowed before giving up on a slot
    pub max_wait_rounds: u32,
    /// Per-key limits
    pub overrides: HashMap<String, WindowLimits>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let window = Duration::from_millis(DEFAULT_RATE_TIME_WINDOW_MS);
        let mut overrides = HashMap::new();
        overrides.insert(
            AUTH_RATE_KEY.to_string(),
            WindowLimits {
                max_requests: AUTH_RATE_MAX_REQUESTS,
                time_window: Duration::from_millis(AUTH_RATE_TIME_WINDOW_MS),
                burst_limit: AUTH_RATE_MAX_REQUESTS,
            },
        );
        overrides.insert(
            FAVORITES_RATE_KEY.to_string(),
            WindowLimits {
                max_requests: FAVORITES_RATE_MAX_REQUESTS,
                time_window: window,
                burst_limit: FAVORITES_RATE_MAX_REQUESTS,
            },
        );

        Self {
            limits: WindowLimits {
                max_requests: DEFAULT_RATE_MAX_REQUESTS,
                time_window: window,
                burst_limit: DEFAULT_RATE_BURST_LIMIT,
            },
            min_backoff: Duration::from_millis(DEFAULT_MIN_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            max_wait: Duration::from_millis(DEFAULT_RATE_MAX_WAIT_MS),
            max_wait_rounds: 32,
            overrides,
        }
    }
}

/// Sliding window of admission timestamps for one key
#[derive(Debug, Default)]
struct RateWindow {
    events: VecDeque<Instant>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant, window: Duration) {
        // Timestamps are appended in order, so stale ones sit at the front
        while let Some(&oldest) = self.events.front() {
            if now.duration_since(oldest) >= window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    fn len(&self) -> usize {
        self.events.len()
    }
}

/// Outcome of a single admission check
enum Admission {
    Admitted,
    Wait(Duration),
}

/// Per-key sliding-window rate limiter with adaptive backoff
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, RateWindow>,
    backoff: Mutex<Duration>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimitConfig) -> Self {
        let backoff = Mutex::new(config.min_backoff);
        Self {
            config,
            windows: DashMap::new(),
            backoff,
        }
    }

    /// Limits in force for `key`
    pub fn limits_for(&self, key: &str) -> WindowLimits {
        self.config
            .overrides
            .get(key)
            .copied()
            .unwrap_or(self.config.limits)
    }

    /// Wait until `key` has room for one more request, then record it
    ///
    /// Elevated priorities may use the burst allowance and sleep for a
    /// fraction of the computed wait. After `max_wait_rounds` suspensions
    /// without a slot the caller gets [`Error::RateLimited`] carrying the
    /// remaining wait; nothing is recorded for it.
    pub async fn check_limit(&self, key: &str, priority: Priority) -> Result<()> {
        let mut rounds = 0u32;

        loop {
            let wait = match self.try_admit(key, priority) {
                Admission::Admitted => {
                    if rounds > 0 {
                        debug!(key = %key, %priority, rounds, "rate_limit_admitted_after_wait");
                    }
                    return Ok(());
                }
                Admission::Wait(wait) => wait,
            };

            rounds += 1;
            if rounds > self.config.max_wait_rounds {
                warn!(key = %key, %priority, rounds, "rate_limit_wait_exhausted");
                return Err(Error::rate_limited(
                    key,
                    Some(wait),
                    "no free slot in the rate-limit window",
                ));
            }

            let scaled = wait
                .div_f64(priority.weight().max(1.0))
                .min(self.config.max_wait);
            debug!(
                key = %key,
                %priority,
                round = rounds,
                wait_ms = scaled.as_millis() as u64,
                "rate_limit_wait"
            );
            sleep(scaled).await;
        }
    }

    /// Evaluate and, when possible, record one admission without suspending
    fn try_admit(&self, key: &str, priority: Priority) -> Admission {
        let limits = self.limits_for(key);
        let now = Instant::now();
        let mut window = self.windows.entry(key.to_string()).or_default();
        window.prune(now, limits.time_window);

        let ceiling = if priority.is_elevated() {
            limits.burst_limit.max(limits.max_requests)
        } else {
            limits.max_requests
        };

        if window.len() < ceiling {
            window.events.push_back(now);
            return Admission::Admitted;
        }

        let until_slot = match window.events.front() {
            Some(&oldest) => limits
                .time_window
                .saturating_sub(now.duration_since(oldest)),
            None => Duration::ZERO,
        };
        Admission::Wait(until_slot.max(self.current_backoff()))
    }

    /// Double the backoff after an upstream 429, up to `max_backoff`
    pub fn increase_backoff(&self) -> Duration {
        let mut backoff = self.backoff.lock();
        *backoff = (*backoff * 2).min(self.config.max_backoff);
        debug!(backoff_ms = backoff.as_millis() as u64, "rate_limit_backoff_increased");
        *backoff
    }

    /// Return the backoff to `min_backoff` after a success
    pub fn reset_backoff(&self) {
        *self.backoff.lock() = self.config.min_backoff;
    }

    /// Current backoff
    pub fn current_backoff(&self) -> Duration {
        *self.backoff.lock()
    }

    /// Forget all windows and the backoff
    pub fn reset(&self) {
        self.windows.clear();
        self.reset_backoff();
    }

    /// Current status of one key
    pub fn status(&self, key: &str) -> RateLimitStatus {
        let limits = self.limits_for(key);
        let in_window = self
            .windows
            .get_mut(key)
            .map(|mut window| {
                window.prune(Instant::now(), limits.time_window);
                window.len()
            })
            .unwrap_or(0);

        RateLimitStatus {
            in_window,
            max_requests: limits.max_requests,
            burst_limit: limits.burst_limit,
            window_duration: limits.time_window,
            backoff: self.current_backoff(),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

/// Current status of one rate-limit key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub in_window: usize,
    pub max_requests: usize,
    pub burst_limit: usize,
    pub window_duration: Duration,
    pub backoff: Duration,
}
