#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Resource Cache
//!
//! > **A normalized, deduplicating cache for REST resources.**
//!
//! Application code asks for "user 42" or "the posts of user 42, page 2" and
//! gets an answer without caring whether it is cached, already on its way, or
//! has to be fetched. Every item is stored once, collections reference items
//! by key, and concurrent requests for the same thing share one fetch.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### One actor owns the store
//! A single [`CacheActor`](actor::CacheActor) task owns the whole store and
//! processes requests *sequentially*. The decision "cached, in flight, or new
//! fetch" is made in one step, so two callers can never both start the same
//! fetch. Readers never lock anything: after every change the actor publishes
//! an immutable snapshot on a `watch` channel.
//!
//! ### Events, not mutation
//! The store only changes by applying a [`StoreEvent`]. Each request produces
//! one `Started` event when it is issued and exactly one `Finished` or
//! `Failed` event when it settles. Terminal events carry the id of the request
//! that caused them, so a stale completion never clears a newer request.
//!
//! ### Canonical keys
//! Every read and write goes through the [`key`] module: `123`, `"123"` and
//! `{"id": 123}` are the same resource, and property order never matters.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. Keys and options ([`key`], [`options`], [`url`])
//! - **Role**: Turn identifiers and query options into stable keys; resolve URL
//!   templates.
//!
//! ### 2. The Store ([`store`])
//! - **Role**: Normalized state per resource type and the pure event
//!   application function.
//! - **Key items**: [`ResourcesState`], [`StoreEvent`], [`Target`].
//!
//! ### 3. The Orchestrator ([`actor`], [`client`], [`message`])
//! - **Role**: Decide per request whether to reuse or fetch, run the fetch and
//!   report its outcome back to the store.
//! - **Key items**: [`CacheClient`], [`Pending`].
//!
//! ### 4. The Query Facade ([`query`])
//! - **Role**: A synchronous, never-failing read for rendering code.
//! - **Key items**: [`CacheClient::query_resource`], [`QueryResult`].
//!
//! ### 5. The Boundary ([`fetch`], [`registry`], [`config`])
//! - **Role**: The injectable transport, per-resource definitions and the
//!   configuration value handed to the actor at start.
//!
//! ### 6. Lifecycle and testing ([`lifecycle`], [`mock`])
//! - **Key items**: [`CacheSystem`](lifecycle::CacheSystem),
//!   [`setup_tracing`](lifecycle::setup_tracing), [`MockFetcher`](mock::MockFetcher).
//!
//! ## 🚀 Quick Start
//!
//! ```rust,no_run
//! use resource_cache::{CacheConfig, CacheSystem, Endpoint, FetchOptions, ResourceId};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CacheConfig::builder()
//!     .resource("users", Endpoint::new("https://api.example.com/users/:id"))
//!     .build()?;
//! let system = CacheSystem::new(config);
//!
//! let user = system
//!     .client
//!     .load_resource("users", ResourceId::from(42), FetchOptions::new(), false)
//!     .await?;
//! println!("{user}");
//!
//! system.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod key;
pub mod lifecycle;
pub mod message;
pub mod mock;
pub mod options;
pub mod query;
pub mod registry;
pub mod store;
pub mod url;

pub use client::CacheClient;
pub use config::CacheConfig;
pub use error::{CacheError, IdTypeError};
pub use fetch::{Fetcher, HttpFetcher, RawResponse};
pub use key::{CollectionKey, QueryKey, ResourceId, ResourceKey};
pub use lifecycle::CacheSystem;
pub use message::Operation;
pub use options::{FetchOptions, Method};
pub use query::{QueryResult, QueryStatus};
pub use registry::{ActionType, Endpoint, ResourceDefinition};
pub use store::{Pending, ResourcesState, StoreEvent, Target};
