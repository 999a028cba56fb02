//! Read helpers over a published [`ResourcesState`] snapshot.

use super::state::{CollectionState, ItemState, Pending, ResourcesState};
use crate::error::CacheError;
use crate::key::{CollectionKey, QueryKey, ResourceKey};
use serde_json::Value;
use std::sync::Arc;

impl ResourcesState {
    /// Loaded or failed: either way a read returns without fetching.
    pub fn resource_is_loaded(&self, resource: &str, key: &ResourceKey) -> bool {
        self.resource(resource)
            .is_some_and(|state| state.items.contains_key(key))
    }

    pub fn get_resource(&self, resource: &str, key: &ResourceKey) -> Option<Result<Arc<Value>, CacheError>> {
        match self.resource(resource)?.items.get(key)? {
            ItemState::Loaded(value) => Some(Ok(Arc::clone(value))),
            ItemState::Failed(error) => Some(Err(error.clone())),
        }
    }

    pub fn resource_is_loading(&self, resource: &str, key: &ResourceKey) -> bool {
        self.resource(resource)
            .is_some_and(|state| state.loading.contains_key(key))
    }

    pub fn resource_load_promise(&self, resource: &str, key: &ResourceKey) -> Option<Pending> {
        self.resource(resource)?
            .loading
            .get(key)
            .map(|entry| entry.promise.clone())
    }

    pub fn collection_is_loaded(&self, resource: &str, collection: &CollectionKey, query: &QueryKey) -> bool {
        self.resource(resource)
            .is_some_and(|state| state.collection(collection, query).is_some())
    }

    /// Members of a collection variant in order. An unknown variant reads as
    /// empty; members cleared since the load are skipped.
    pub fn get_collection(
        &self,
        resource: &str,
        collection: &CollectionKey,
        query: &QueryKey,
    ) -> Result<Vec<Arc<Value>>, CacheError> {
        let Some(state) = self.resource(resource) else {
            return Ok(Vec::new());
        };
        match state.collection(collection, query) {
            None => Ok(Vec::new()),
            Some(CollectionState::Failed(error)) => Err(error.clone()),
            Some(CollectionState::Loaded { associated_ids }) => Ok(associated_ids
                .iter()
                .filter_map(|key| match state.items.get(key)? {
                    ItemState::Loaded(value) => Some(Arc::clone(value)),
                    ItemState::Failed(_) => None,
                })
                .collect()),
        }
    }

    pub fn collection_is_loading(&self, resource: &str, collection: &CollectionKey, query: &QueryKey) -> bool {
        self.collection_load_promise(resource, collection, query)
            .is_some()
    }

    pub fn collection_load_promise(
        &self,
        resource: &str,
        collection: &CollectionKey,
        query: &QueryKey,
    ) -> Option<Pending> {
        self.resource(resource)?
            .loading_collections
            .get(collection)?
            .get(query)
            .map(|entry| entry.promise.clone())
    }

    pub fn is_creating(&self, resource: &str) -> bool {
        self.resource(resource)
            .is_some_and(|state| state.is_creating)
    }

    pub fn is_updating(&self, resource: &str, key: &ResourceKey) -> bool {
        self.resource(resource)
            .is_some_and(|state| state.updating.contains_key(key))
    }

    pub fn is_destroying(&self, resource: &str, key: &ResourceKey) -> bool {
        self.resource(resource)
            .is_some_and(|state| state.destroying.contains_key(key))
    }
}
