#![allow(dead_code)]

use resource_cache::lifecycle::setup_tracing;
use resource_cache::mock::MockFetcher;
use resource_cache::Operation;
use resource_cache::{ActionType, CacheClient, CacheConfig, CacheSystem, Endpoint, ResourcesState};
use std::time::Duration;

pub const USERS_URL: &str = "http://api.test/users/:id";

/// A cache with a `users` resource served by `mock`.
pub fn start(mock: &MockFetcher) -> CacheSystem {
    setup_tracing();
    let config = CacheConfig::builder()
        .resource("users", Endpoint::new(USERS_URL))
        .fetcher(mock.clone())
        .build()
        .expect("config");
    CacheSystem::new(config)
}

/// Waits until the published state satisfies `predicate`.
pub async fn wait_for(client: &CacheClient, predicate: impl Fn(&ResourcesState) -> bool) {
    let mut snapshots = client.subscribe();
    tokio::time::timeout(Duration::from_secs(5), snapshots.wait_for(|state| predicate(state)))
        .await
        .expect("timed out waiting for cache state")
        .expect("cache actor stopped");
}

/// Waits until no request of any resource type is in flight.
///
/// Only the newest request per key is tracked, so a superseded request may
/// still report back after this returns. Use [`barrier`] once its promise
/// has resolved to be sure its outcome was applied.
pub async fn wait_idle(client: &CacheClient) {
    wait_for(client, |state| {
        state
            .resource_types()
            .all(|name| state.resource(name).is_some_and(|entity| entity.is_settled()))
    })
    .await;
}

/// Returns once every event queued before it has been applied.
///
/// Fetch tasks whose promise already resolved get a few turns to report back,
/// then a request round-trips through the actor behind their events.
pub async fn barrier(client: &CacheClient) {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    let _ = client
        .execute(Operation::new("__barrier", ActionType::Load))
        .await
        .await;
}
