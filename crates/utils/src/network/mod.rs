//! Network-related utilities.
//!
//! This module provides tools for managing network interactions: admission
//! control so a single endpoint is never flooded, and a retry policy that
//! decides which failures are worth another attempt.
//!
//! ## Key Components
//!
//! - **`rate_limit`**: per-key sliding windows with a priority burst
//!   allowance and a backoff that tracks upstream 429 answers.
//! - **`retry`**: error classification and exponential backoff with jitter.

pub mod rate_limit;
pub mod retry;

pub use rate_limit::{RateLimitConfig, RateLimitStatus, RateLimiter, WindowLimits};
pub use retry::{
    retry_async, Classification, RetryConfig, RetryDecision, RetryPolicy, RetryableError,
};
