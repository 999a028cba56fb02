//! Messages understood by the [`CacheActor`](crate::actor::CacheActor).

use crate::fetch::Fetcher;
use crate::key::ResourceId;
use crate::options::FetchOptions;
use crate::registry::ActionType;
use crate::store::{Pending, StoreEvent};
use std::sync::Arc;
use tokio::sync::oneshot;

/// One request against a registered resource.
#[derive(Clone)]
pub struct Operation {
    pub resource: String,
    pub action: ActionType,
    pub id: Option<ResourceId>,
    pub opts: FetchOptions,
    /// Skip the cached value and any in-flight request.
    pub force_fetch: bool,
    /// Replaces the configured fetcher for this request only.
    pub fetcher: Option<Arc<dyn Fetcher>>,
}

impl Operation {
    pub fn new(resource: impl Into<String>, action: ActionType) -> Self {
        Self {
            resource: resource.into(),
            action,
            id: None,
            opts: FetchOptions::default(),
            force_fetch: false,
            fetcher: None,
        }
    }

    pub fn id(mut self, id: impl Into<ResourceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn maybe_id(mut self, id: Option<ResourceId>) -> Self {
        self.id = id;
        self
    }

    pub fn opts(mut self, opts: FetchOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn force_fetch(mut self, force_fetch: bool) -> Self {
        self.force_fetch = force_fetch;
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("resource", &self.resource)
            .field("action", &self.action)
            .field("id", &self.id)
            .field("opts", &self.opts)
            .field("force_fetch", &self.force_fetch)
            .field("fetcher", &self.fetcher.is_some())
            .finish()
    }
}

/// # Architecture Note
/// `Execute` is answered with a [`Pending`] handle rather than a result: the
/// actor decides (cached, in flight, or new fetch) and moves on. The fetch
/// itself runs in its own task and reports back with `Dispatch`.
pub enum CacheRequest {
    Execute {
        operation: Operation,
        respond_to: oneshot::Sender<Pending>,
    },
    Dispatch(StoreEvent),
}
