/// Constants used throughout the storegate codebase
// Remote API
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

// Cache lifetimes
pub const DEFAULT_CACHE_MAX_SIZE: usize = 500;
pub const DEFAULT_CACHE_TTL_MS: u64 = 30 * 60 * 1000;
pub const DEFAULT_CACHE_STALE_TTL_MS: u64 = 60 * 60 * 1000;

// Fraction of the cache dropped when it is full
pub const CACHE_EVICTION_FRACTION: f64 = 0.1;

// Sliding-window admission
pub const DEFAULT_RATE_MAX_REQUESTS: usize = 20;
pub const DEFAULT_RATE_TIME_WINDOW_MS: u64 = 60 * 1000;
pub const DEFAULT_RATE_BURST_LIMIT: usize = 30;
pub const DEFAULT_MIN_BACKOFF_MS: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5000;
pub const DEFAULT_RATE_MAX_WAIT_MS: u64 = 5000;

// Per-endpoint admission overrides
pub const AUTH_RATE_KEY: &str = "auth";
pub const AUTH_RATE_MAX_REQUESTS: usize = 5;
pub const AUTH_RATE_TIME_WINDOW_MS: u64 = 60 * 1000;
pub const FAVORITES_RATE_KEY: &str = "favorites";
pub const FAVORITES_RATE_MAX_REQUESTS: usize = 200;

// Network attempts
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_MAX_CONCURRENT: usize = 6;
pub const DEFAULT_JITTER_FACTOR: f64 = 0.1;

// Session
pub const DEFAULT_REFRESH_THRESHOLD_MS: u64 = 5 * 60 * 1000;
pub const TOKEN_STORAGE_KEY: &str = "token";

// Profile edits
pub const DEFAULT_PROFILE_BATCH_DELAY_MS: u64 = 1000;

// Environment variable names
pub const STOREGATE_BASE_URL_VAR: &str = "STOREGATE_BASE_URL";
pub const STOREGATE_TIMEOUT_MS_VAR: &str = "STOREGATE_TIMEOUT_MS";
pub const STOREGATE_MAX_RETRIES_VAR: &str = "STOREGATE_MAX_RETRIES";
pub const STOREGATE_STATE_DIR_VAR: &str = "STOREGATE_STATE_DIR";
pub const STOREGATE_CONFIG_VAR: &str = "STOREGATE_CONFIG";

// File names
pub const CONFIG_FILENAME: &str = "config.json";
pub const STATE_FILENAME: &str = "state.json";
