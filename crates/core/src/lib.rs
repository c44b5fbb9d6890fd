//! Core domain types, errors, and constants for `storegate`.
//!
//! This crate establishes the foundational data structures and error handling
//! used by every other crate in the workspace.
//!
//! ## Key Components
//!
//! - **`errors`**: the primary `Error` enum and `Result` alias. Every failure
//!   the gateway can surface to a call site is one of its variants.
//! - **`types`**: `Priority` plus the catalog and account records exchanged
//!   with the remote API (`Category`, `Product`, `Profile`, ...).
//! - **`constants`**: shared defaults such as cache lifetimes, rate limits and
//!   environment variable names.
//! - **`events`**: session lifecycle events broadcast to subscribers.

pub mod constants;
pub mod errors;
pub mod events;
pub mod types;

pub use self::{
    constants::*,
    errors::{generic_message, Error, FieldError, Result, ResultExt},
    events::{LogoutReason, SessionEvent, SessionEvents},
    types::*,
};
