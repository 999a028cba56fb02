//! # Observability & Tracing
//!
//! The [`setup_tracing`] function installs a compact `tracing_subscriber::fmt`
//! subscriber. Log levels come from the `RUST_LOG` environment variable.
//!
//! ## What Gets Traced
//!
//! - **Actor Lifecycle**: startup (with the registered resources) and shutdown
//! - **Decisions**: cache hits, joined in-flight loads and started fetches,
//!   each tagged with `resource` and the derived key
//! - **Outcomes**: finished mutations at `info`, failed fetches and malformed
//!   collection payloads at `warn`
//! - **Client Calls**: one span per `load_*` / mutation call
//!
//! ## Usage Examples
//!
//! ```bash
//! # Lifecycle, mutations and failures
//! RUST_LOG=info cargo test
//!
//! # Every cache decision
//! RUST_LOG=resource_cache=debug cargo test
//! ```
//!
//! **With `RUST_LOG=debug`**:
//!
//! ```text
//! INFO Cache actor started config=CacheConfig { resources: ["users"], .. }
//! DEBUG load_resource{resource="users" id={"id":"1"}}: Fetch started resource=users action=LOAD request=1
//! DEBUG Fetch finished resource=users action=LOAD request=1
//! DEBUG load_resource{resource="users" id={"id":"1"}}: Cache hit resource="users" key={"id":"1"}
//! ```

/// Initializes compact structured logging filtered by `RUST_LOG`.
///
/// Calling it more than once is harmless; only the first call installs a
/// subscriber.
pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
