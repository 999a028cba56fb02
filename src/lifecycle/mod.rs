//! Runtime lifecycle of the cache.
//!
//! - [`CacheSystem`] - spawns the cache actor and shuts it down gracefully
//! - [`setup_tracing`] - initializes the tracing/logging infrastructure

pub mod cache_system;
pub mod tracing;

pub use cache_system::*;
pub use tracing::*;
