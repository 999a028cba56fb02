//! # Cache Client
//!
//! The cloneable handle application code uses to talk to the
//! [`CacheActor`](crate::actor::CacheActor).
//!
//! Every request method comes in two layers:
//! - [`CacheClient::execute`] / [`CacheClient::request`] hand back the
//!   [`Pending`] handle, shared with every other caller of the same request.
//! - `load_resource`, `create_resource`, ... await that handle and return the
//!   result.

use crate::error::CacheError;
use crate::key::{QueryKey, ResourceId};
use crate::message::{CacheRequest, Operation};
use crate::options::FetchOptions;
use crate::registry::ActionType;
use crate::store::{settled, Pending, ResourcesState, StoreEvent};
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::instrument;

#[derive(Clone)]
pub struct CacheClient {
    sender: mpsc::UnboundedSender<CacheRequest>,
    snapshots: watch::Receiver<Arc<ResourcesState>>,
}

impl CacheClient {
    pub fn new(
        sender: mpsc::UnboundedSender<CacheRequest>,
        snapshots: watch::Receiver<Arc<ResourcesState>>,
    ) -> Self {
        Self { sender, snapshots }
    }

    /// Sends `operation` to the actor and returns the handle it decided on.
    ///
    /// Two loads of the same key issued before the first one settles get the
    /// very same handle back.
    pub async fn execute(&self, operation: Operation) -> Pending {
        let (respond_to, response) = oneshot::channel();
        if self
            .sender
            .send(CacheRequest::Execute { operation, respond_to })
            .is_err()
        {
            return settled(Err(CacheError::ActorClosed));
        }
        response
            .await
            .unwrap_or_else(|_| settled(Err(CacheError::ActorDropped)))
    }

    /// Like [`execute`](Self::execute), but callable outside async code. The
    /// operation is queued immediately; the returned handle follows the
    /// actor's decision once awaited.
    pub fn request(&self, operation: Operation) -> Pending {
        let (respond_to, response) = oneshot::channel();
        if self
            .sender
            .send(CacheRequest::Execute { operation, respond_to })
            .is_err()
        {
            return settled(Err(CacheError::ActorClosed));
        }
        async move {
            let pending = response.await.map_err(|_| CacheError::ActorDropped)?;
            pending.await
        }
        .boxed()
        .shared()
    }

    #[instrument(skip(self, id, opts), fields(id = %id))]
    pub async fn load_resource(
        &self,
        resource: &str,
        id: ResourceId,
        opts: FetchOptions,
        force_fetch: bool,
    ) -> Result<Value, CacheError> {
        let op = Operation::new(resource, ActionType::Load)
            .id(id)
            .opts(opts)
            .force_fetch(force_fetch);
        self.execute(op).await.await
    }

    #[instrument(skip(self, opts))]
    pub async fn load_collection(
        &self,
        resource: &str,
        id: Option<ResourceId>,
        opts: FetchOptions,
        force_fetch: bool,
    ) -> Result<Value, CacheError> {
        let op = Operation::new(resource, ActionType::LoadCollection)
            .maybe_id(id)
            .opts(opts)
            .force_fetch(force_fetch);
        self.execute(op).await.await
    }

    #[instrument(skip(self, opts))]
    pub async fn create_resource(
        &self,
        resource: &str,
        id: Option<ResourceId>,
        opts: FetchOptions,
    ) -> Result<Value, CacheError> {
        self.mutate(resource, ActionType::Create, id, opts).await
    }

    #[instrument(skip(self, id, opts), fields(id = %id))]
    pub async fn update_resource(&self, resource: &str, id: ResourceId, opts: FetchOptions) -> Result<Value, CacheError> {
        self.mutate(resource, ActionType::Update, Some(id), opts).await
    }

    #[instrument(skip(self, id, opts), fields(id = %id))]
    pub async fn patch_resource(&self, resource: &str, id: ResourceId, opts: FetchOptions) -> Result<Value, CacheError> {
        self.mutate(resource, ActionType::Patch, Some(id), opts).await
    }

    #[instrument(skip(self, opts))]
    pub async fn update_collection(
        &self,
        resource: &str,
        id: Option<ResourceId>,
        opts: FetchOptions,
    ) -> Result<Value, CacheError> {
        self.mutate(resource, ActionType::UpdateCollection, id, opts).await
    }

    #[instrument(skip(self, id, opts), fields(id = %id))]
    pub async fn destroy_resource(&self, resource: &str, id: ResourceId, opts: FetchOptions) -> Result<Value, CacheError> {
        self.mutate(resource, ActionType::Destroy, Some(id), opts).await
    }

    async fn mutate(
        &self,
        resource: &str,
        action: ActionType,
        id: Option<ResourceId>,
        opts: FetchOptions,
    ) -> Result<Value, CacheError> {
        let op = Operation::new(resource, action).maybe_id(id).opts(opts);
        self.execute(op).await.await
    }

    /// Drops a cached item unless a loaded collection still lists it.
    pub fn clear_resource(&self, resource: &str, id: &ResourceId) -> Result<(), CacheError> {
        self.dispatch(StoreEvent::ClearResource {
            resource: resource.to_string(),
            key: id.resource_key(),
        })
    }

    /// Drops one collection variant and every member no other variant lists.
    pub fn clear_collection(&self, resource: &str, id: Option<&ResourceId>, opts: &FetchOptions) -> Result<(), CacheError> {
        self.dispatch(StoreEvent::ClearCollection {
            resource: resource.to_string(),
            collection: id.cloned().unwrap_or_default().collection_key(),
            query: opts.query_key(),
        })
    }

    pub fn reset(&self) -> Result<(), CacheError> {
        self.dispatch(StoreEvent::Reset)
    }

    fn dispatch(&self, event: StoreEvent) -> Result<(), CacheError> {
        self.sender
            .send(CacheRequest::Dispatch(event))
            .map_err(|_| CacheError::ActorClosed)
    }

    /// The latest published state.
    pub fn snapshot(&self) -> Arc<ResourcesState> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// A receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ResourcesState>> {
        self.snapshots.clone()
    }

    /// Cached value or error of one resource, without fetching.
    pub fn get_resource(&self, resource: &str, id: &ResourceId) -> Option<Result<Arc<Value>, CacheError>> {
        self.snapshot().get_resource(resource, &id.resource_key())
    }

    /// Cached members of one collection variant, without fetching.
    pub fn get_collection(
        &self,
        resource: &str,
        id: Option<&ResourceId>,
        query: &QueryKey,
    ) -> Result<Vec<Arc<Value>>, CacheError> {
        let collection = id.cloned().unwrap_or_default().collection_key();
        self.snapshot().get_collection(resource, &collection, query)
    }
}
