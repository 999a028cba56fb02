use crate::error::CacheError;
use crate::key::{CollectionKey, QueryKey, ResourceKey};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// A cloneable handle on the outcome of a request.
///
/// Every caller that is handed the same `Pending` observes the same result,
/// which is how concurrent loads of one key share a single fetch.
pub type Pending = Shared<BoxFuture<'static, Result<Value, CacheError>>>;

/// A handle that is already resolved.
pub fn settled(result: Result<Value, CacheError>) -> Pending {
    futures::future::ready(result).boxed().shared()
}

/// Identifies one fetch issued by the cache actor. Ids grow monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// An in-flight request tracked by the store.
#[derive(Clone)]
pub struct InFlight {
    pub request: RequestId,
    pub promise: Pending,
}

impl Debug for InFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlight")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemState {
    Loaded(Arc<Value>),
    Failed(CacheError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollectionState {
    /// Member keys in response order, without duplicates.
    Loaded { associated_ids: Vec<ResourceKey> },
    Failed(CacheError),
}

impl CollectionState {
    pub fn associated_ids(&self) -> &[ResourceKey] {
        match self {
            CollectionState::Loaded { associated_ids } => associated_ids,
            CollectionState::Failed(_) => &[],
        }
    }
}

/// A value per collection variant, keyed by scope then query.
pub type Scoped<V> = HashMap<CollectionKey, HashMap<QueryKey, V>>;

/// In-flight requests of collection variants.
pub type ScopedInFlight = Scoped<InFlight>;

/// Normalized state of one resource type.
///
/// Every map sits behind its own `Arc`, so an event copies only the maps it
/// writes to while a published snapshot still shares them.
#[derive(Debug, Clone, Default)]
pub struct EntityState {
    pub items: Arc<HashMap<ResourceKey, ItemState>>,
    pub collections: Arc<Scoped<CollectionState>>,
    pub loading: Arc<HashMap<ResourceKey, InFlight>>,
    pub loading_collections: Arc<ScopedInFlight>,
    pub updating: Arc<HashMap<ResourceKey, InFlight>>,
    pub updating_collections: Arc<ScopedInFlight>,
    pub destroying: Arc<HashMap<ResourceKey, InFlight>>,
    pub is_creating: bool,
    /// Request that last wrote each item. Destroyed items keep theirs.
    pub(crate) revisions: Arc<HashMap<ResourceKey, RequestId>>,
    /// Request that last wrote each collection variant.
    pub(crate) collection_revisions: Arc<Scoped<RequestId>>,
}

impl EntityState {
    pub fn collection(&self, collection: &CollectionKey, query: &QueryKey) -> Option<&CollectionState> {
        self.collections.get(collection)?.get(query)
    }

    /// Whether any loaded collection variant lists `key` as a member.
    pub fn is_referenced(&self, key: &ResourceKey) -> bool {
        self.collections
            .values()
            .flat_map(HashMap::values)
            .any(|state| state.associated_ids().contains(key))
    }

    /// No request of any kind is in flight.
    pub fn is_settled(&self) -> bool {
        self.loading.is_empty()
            && self.loading_collections.is_empty()
            && self.updating.is_empty()
            && self.updating_collections.is_empty()
            && self.destroying.is_empty()
            && !self.is_creating
    }
}

/// State of every resource type, as published to readers.
///
/// Cloning is cheap: entity states are shared and copied only when the actor
/// writes to one that a reader still holds.
#[derive(Debug, Clone, Default)]
pub struct ResourcesState {
    pub(crate) resources: HashMap<String, Arc<EntityState>>,
}

impl ResourcesState {
    pub fn resource(&self, resource: &str) -> Option<&EntityState> {
        self.resources.get(resource).map(Arc::as_ref)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Entity state of `resource`, created empty on first use.
    pub(crate) fn resource_mut(&mut self, resource: &str) -> &mut EntityState {
        let entry = self.resources.entry(resource.to_string()).or_default();
        Arc::make_mut(entry)
    }
}
