//! Session credential lifecycle
//!
//! ```text
//! Unset -> Valid -> NearExpiry -> Refreshing -> Valid
//!                                            \-> Unset (logout cascade)
//! ```
//!
//! A stored token whose `exp` has already passed is `Expired` and is
//! discarded on first observation.

pub mod claims;
mod manager;
mod refresher;

pub use manager::{TokenManager, TokenManagerConfig, TokenPhase};
pub use refresher::{HttpRefresher, TokenRefresher};
