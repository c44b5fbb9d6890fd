//! Configuration management for storegate
//!
//! Settings are layered: built-in defaults, then an optional JSON file, then
//! `STOREGATE_*` environment variables. The result is validated once and then
//! treated as immutable.

pub mod config;
pub mod loader;

pub use config::*;
pub use loader::*;
