//! # Query Facade
//!
//! A synchronous read for rendering code: "what do we have for X right now,
//! and make sure it is on its way". A query never fails and never panics.
//! Failures show up in [`QueryResult::error`] and in the outcome of
//! [`QueryResult::promise`].
//!
//! ```rust,no_run
//! # use resource_cache::{CacheClient, FetchOptions, ResourceId, QueryStatus};
//! # fn render(client: &CacheClient) {
//! let user = client.query_resource("users", ResourceId::from(1), FetchOptions::new(), false);
//! match user.status {
//!     QueryStatus::Complete => println!("{:?}", user.data),
//!     QueryStatus::Loading => println!("loading..."),
//! }
//! # }
//! ```

use crate::client::CacheClient;
use crate::error::CacheError;
use crate::key::ResourceId;
use crate::message::Operation;
use crate::options::FetchOptions;
use crate::registry::ActionType;
use crate::store::Pending;
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Loaded or failed, and not forced to refetch.
    Complete,
    Loading,
}

#[derive(Clone)]
pub struct QueryResult<T> {
    /// What the store held when the query was made.
    pub data: T,
    pub status: QueryStatus,
    pub error: Option<CacheError>,
    /// Resolves with the outcome of the underlying load.
    pub promise: Pending,
}

impl<T: std::fmt::Debug> std::fmt::Debug for QueryResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("data", &self.data)
            .field("status", &self.status)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> QueryResult<T> {
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }
}

impl CacheClient {
    pub fn query_resource(
        &self,
        resource: &str,
        id: ResourceId,
        opts: FetchOptions,
        force_fetch: bool,
    ) -> QueryResult<Option<Arc<Value>>> {
        let state = self.snapshot();
        let key = id.resource_key();
        let (data, error) = match state.get_resource(resource, &key) {
            Some(Ok(value)) => (Some(value), None),
            Some(Err(error)) => (None, Some(error)),
            None => (None, None),
        };
        let status = status_of(state.resource_is_loaded(resource, &key), force_fetch);

        let op = Operation::new(resource, ActionType::Load)
            .id(id)
            .opts(opts)
            .force_fetch(force_fetch);
        let promise = self.request(op);
        swallow(&promise);

        QueryResult { data, status, error, promise }
    }

    pub fn query_collection(
        &self,
        resource: &str,
        id: Option<ResourceId>,
        opts: FetchOptions,
        force_fetch: bool,
    ) -> QueryResult<Vec<Arc<Value>>> {
        let state = self.snapshot();
        let collection = id.clone().unwrap_or_default().collection_key();
        let query = opts.query_key();
        let (data, error) = match state.get_collection(resource, &collection, &query) {
            Ok(members) => (members, None),
            Err(error) => (Vec::new(), Some(error)),
        };
        let status = status_of(state.collection_is_loaded(resource, &collection, &query), force_fetch);

        let op = Operation::new(resource, ActionType::LoadCollection)
            .maybe_id(id)
            .opts(opts)
            .force_fetch(force_fetch);
        let promise = self.request(op);
        swallow(&promise);

        QueryResult { data, status, error, promise }
    }
}

fn status_of(loaded: bool, force_fetch: bool) -> QueryStatus {
    if loaded && !force_fetch {
        QueryStatus::Complete
    } else {
        QueryStatus::Loading
    }
}

/// Drives the load to completion and discards its outcome, so nobody has to
/// await the promise for the store to be updated. Outside a runtime the
/// promise is left to the caller.
fn swallow(promise: &Pending) {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(promise.clone().map(drop));
    }
}
