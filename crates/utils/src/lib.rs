//! Shared utilities for storegate
//!
//! This crate provides the building blocks the gateway is assembled from:
//! admission control and retry policy for network calls, atomic file writes
//! for durable state, XDG path resolution and tracing setup.

pub mod atomic_file;
pub mod network;
pub mod tracing;
pub mod xdg;

pub use atomic_file::*;
pub use network::*;
pub use xdg::*;
