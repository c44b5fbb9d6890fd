//! Client-side resilient request gateway for `storegate`
//!
//! Call sites ask the [`Gateway`] for catalog and account resources. Behind
//! it sit a response cache, a per-endpoint rate limiter, an in-flight
//! deduplicating coordinator, a classified retry policy and a single-flight
//! token manager.
//!
//! ```no_run
//! # async fn demo() -> storegate_core::Result<()> {
//! use storegate_client::Gateway;
//!
//! let gateway = Gateway::builder().in_memory().build()?;
//! let categories = gateway.categories().await?;
//! println!("{} top-level categories", categories.len());
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod gateway;
pub mod pipeline;
pub mod profile;
pub mod resources;
pub mod token;
pub mod transport;

pub use coordinator::{PendingResult, RequestCoordinator, RunFn};
pub use gateway::{normalize_listing, Gateway, GatewayBuilder};
pub use pipeline::{classify_response, Pipeline, Stage};
pub use profile::{PendingUpdate, ProfileBatcher};
pub use resources::{Resource, ResourcePolicy};
pub use token::{HttpRefresher, TokenManager, TokenManagerConfig, TokenPhase, TokenRefresher};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};
