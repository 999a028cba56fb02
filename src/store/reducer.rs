//! # Event Application
//!
//! [`ResourcesState::apply`] is the only way the store changes. It is a total
//! function: malformed payloads are recorded as errors, never raised.
//!
//! Outcomes are ordered by [`RequestId`]. A completion is discarded when a
//! newer request for the same key is still in flight or has already written
//! the key, so overlapping requests converge on the newest answer whatever
//! order they finish in.

use super::event::{StoreEvent, Target};
use super::state::{
    CollectionState, EntityState, InFlight, ItemState, RequestId, ResourcesState, Scoped,
};
use crate::error::{CacheError, IdTypeError};
use crate::key::{self, CollectionKey, QueryKey, ResourceKey};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

impl ResourcesState {
    pub fn apply(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::Started { resource, target, request } => {
                self.resource_mut(&resource).start(target, request);
            }
            StoreEvent::Finished { resource, target, request, data } => {
                self.resource_mut(&resource).finish(&resource, target, request, data);
            }
            StoreEvent::Failed { resource, target, request, error } => {
                self.resource_mut(&resource).fail(&resource, target, request, error);
            }
            StoreEvent::ClearResource { resource, key } => {
                self.resource_mut(&resource).clear_resource(&key);
            }
            StoreEvent::ClearCollection { resource, collection, query } => {
                self.resource_mut(&resource).clear_collection(&collection, &query);
            }
            StoreEvent::Reset => self.resources.clear(),
        }
    }
}

impl EntityState {
    fn start(&mut self, target: Target, request: InFlight) {
        match target {
            Target::Load(key) => {
                Arc::make_mut(&mut self.loading).insert(key, request);
            }
            Target::LoadCollection { collection, query, .. } => {
                insert_scoped(&mut self.loading_collections, collection, query, request);
            }
            Target::Create { .. } => self.is_creating = true,
            Target::Update(key) | Target::Patch(key) => {
                Arc::make_mut(&mut self.updating).insert(key, request);
            }
            Target::UpdateCollection { collection, query, .. } => {
                insert_scoped(&mut self.updating_collections, collection, query, request);
            }
            Target::Destroy(key) => {
                Arc::make_mut(&mut self.destroying).insert(key, request);
            }
        }
    }

    fn finish(&mut self, resource: &str, target: Target, request: RequestId, data: Value) {
        match target {
            Target::Load(key) => {
                if !settle(&mut self.loading, &key, request) {
                    debug!(resource, %key, request = request.0, "Superseded load discarded");
                    return;
                }
                let item = if data.is_array() {
                    ItemState::Failed(CacheError::ArrayResponse)
                } else {
                    ItemState::Loaded(Arc::new(data))
                };
                self.write_item(key, item, request);
            }
            Target::LoadCollection { collection, query, id_key } => {
                if settle_scoped(&mut self.loading_collections, &collection, &query, request) {
                    self.write_collection(resource, collection, query, &id_key, request, data);
                }
            }
            Target::UpdateCollection { collection, query, id_key } => {
                if settle_scoped(&mut self.updating_collections, &collection, &query, request) {
                    self.write_collection(resource, collection, query, &id_key, request, data);
                }
            }
            Target::Create { id_key } => {
                self.is_creating = false;
                match data.get(&id_key).map(key::resource_key) {
                    Some(Ok(key)) => self.write_item(key, ItemState::Loaded(Arc::new(data)), request),
                    _ => warn!(resource, id_key = %id_key, "Created resource has no usable id"),
                }
                self.collections = Arc::default();
                self.collection_revisions = Arc::default();
            }
            Target::Update(key) | Target::Patch(key) => {
                if settle(&mut self.updating, &key, request) {
                    self.write_item(key, ItemState::Loaded(Arc::new(data)), request);
                }
            }
            Target::Destroy(key) => {
                settle(&mut self.destroying, &key, request);
                Arc::make_mut(&mut self.items).remove(&key);
                // Tombstone: loads issued before the delete cannot bring it back.
                Arc::make_mut(&mut self.revisions).insert(key.clone(), request);
                if self.is_referenced(&key) {
                    for variants in Arc::make_mut(&mut self.collections).values_mut() {
                        for state in variants.values_mut() {
                            if let CollectionState::Loaded { associated_ids } = state {
                                associated_ids.retain(|member| member != &key);
                            }
                        }
                    }
                }
            }
        }
    }

    fn fail(&mut self, resource: &str, target: Target, request: RequestId, error: CacheError) {
        match target {
            Target::Load(key) => {
                if settle(&mut self.loading, &key, request) {
                    self.write_item(key, ItemState::Failed(error), request);
                } else {
                    debug!(resource, %key, request = request.0, "Superseded load discarded");
                }
            }
            Target::LoadCollection { collection, query, .. } => {
                if settle_scoped(&mut self.loading_collections, &collection, &query, request) {
                    self.write_variant(collection, query, CollectionState::Failed(error), request);
                }
            }
            Target::UpdateCollection { collection, query, .. } => {
                if settle_scoped(&mut self.updating_collections, &collection, &query, request) {
                    self.write_variant(collection, query, CollectionState::Failed(error), request);
                }
            }
            Target::Create { .. } => self.is_creating = false,
            Target::Update(key) | Target::Patch(key) => {
                settle(&mut self.updating, &key, request);
            }
            Target::Destroy(key) => {
                settle(&mut self.destroying, &key, request);
            }
        }
    }

    /// Normalizes a collection payload into items plus an ordered member list.
    fn write_collection(
        &mut self,
        resource: &str,
        collection: CollectionKey,
        query: QueryKey,
        id_key: &str,
        request: RequestId,
        data: Value,
    ) {
        if self.variant_written_after(&collection, &query, request) {
            debug!(resource, %collection, %query, request = request.0, "Superseded collection discarded");
            return;
        }
        let Value::Array(elements) = data else {
            warn!(resource, %collection, %query, "Collection response is not an array");
            let empty = CollectionState::Loaded { associated_ids: Vec::new() };
            self.write_variant(collection, query, empty, request);
            return;
        };

        let keys: Result<Vec<ResourceKey>, IdTypeError> = elements
            .iter()
            .map(|element| key::resource_key(element.get(id_key).unwrap_or(&Value::Null)))
            .collect();
        let keys = match keys {
            Ok(keys) => keys,
            Err(e) => {
                warn!(resource, %collection, %query, id_key, error = %e, "Collection member has no usable id");
                self.write_variant(collection, query, CollectionState::Failed(e.into()), request);
                return;
            }
        };

        let mut associated_ids = Vec::with_capacity(keys.len());
        let mut seen = HashSet::with_capacity(keys.len());
        for (key, element) in keys.into_iter().zip(elements) {
            if seen.insert(key.clone()) {
                associated_ids.push(key.clone());
            }
            self.write_item(key, ItemState::Loaded(Arc::new(element)), request);
        }
        self.write_variant(collection, query, CollectionState::Loaded { associated_ids }, request);
    }

    /// Stores `state` unless a newer request already wrote this item.
    fn write_item(&mut self, key: ResourceKey, state: ItemState, request: RequestId) {
        if self.revisions.get(&key).is_some_and(|written| *written > request) {
            return;
        }
        Arc::make_mut(&mut self.revisions).insert(key.clone(), request);
        Arc::make_mut(&mut self.items).insert(key, state);
    }

    fn variant_written_after(&self, collection: &CollectionKey, query: &QueryKey, request: RequestId) -> bool {
        self.collection_revisions
            .get(collection)
            .and_then(|variants| variants.get(query))
            .is_some_and(|written| *written > request)
    }

    fn write_variant(&mut self, collection: CollectionKey, query: QueryKey, state: CollectionState, request: RequestId) {
        if self.variant_written_after(&collection, &query, request) {
            return;
        }
        insert_scoped(&mut self.collection_revisions, collection.clone(), query.clone(), request);
        insert_scoped(&mut self.collections, collection, query, state);
    }

    fn remove_item(&mut self, key: &ResourceKey) {
        if self.items.contains_key(key) {
            Arc::make_mut(&mut self.items).remove(key);
        }
        if self.revisions.contains_key(key) {
            Arc::make_mut(&mut self.revisions).remove(key);
        }
    }

    fn clear_resource(&mut self, key: &ResourceKey) {
        if self.is_referenced(key) {
            return;
        }
        self.remove_item(key);
        if self.loading.contains_key(key) {
            Arc::make_mut(&mut self.loading).remove(key);
        }
    }

    fn clear_collection(&mut self, collection: &CollectionKey, query: &QueryKey) {
        let removed = remove_scoped(&mut self.collections, collection, query);
        remove_scoped(&mut self.collection_revisions, collection, query);
        remove_scoped(&mut self.loading_collections, collection, query);

        if let Some(removed) = removed {
            for member in removed.associated_ids() {
                if !self.is_referenced(member) {
                    self.remove_item(member);
                }
            }
        }
    }
}

/// Removes the entry of `request` for `key`. Returns `false` when a newer
/// request for the key is in flight, i.e. this outcome is stale.
fn settle(map: &mut Arc<HashMap<ResourceKey, InFlight>>, key: &ResourceKey, request: RequestId) -> bool {
    match map.get(key).map(|entry| entry.request) {
        Some(current) if current == request => {
            Arc::make_mut(map).remove(key);
            true
        }
        Some(current) => current < request,
        None => true,
    }
}

fn settle_scoped(
    map: &mut Arc<Scoped<InFlight>>,
    collection: &CollectionKey,
    query: &QueryKey,
    request: RequestId,
) -> bool {
    let current = map
        .get(collection)
        .and_then(|variants| variants.get(query))
        .map(|entry| entry.request);
    match current {
        Some(current) if current == request => {
            remove_scoped(map, collection, query);
            true
        }
        Some(current) => current < request,
        None => true,
    }
}

fn insert_scoped<V: Clone>(map: &mut Arc<Scoped<V>>, collection: CollectionKey, query: QueryKey, value: V) {
    Arc::make_mut(map)
        .entry(collection)
        .or_default()
        .insert(query, value);
}

/// Removes one variant, dropping its scope once empty. Leaves `map` shared
/// when there is nothing to remove.
fn remove_scoped<V: Clone>(map: &mut Arc<Scoped<V>>, collection: &CollectionKey, query: &QueryKey) -> Option<V> {
    if !map.get(collection).is_some_and(|variants| variants.contains_key(query)) {
        return None;
    }
    let map = Arc::make_mut(map);
    let variants = map.get_mut(collection)?;
    let removed = variants.remove(query);
    if variants.is_empty() {
        map.remove(collection);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ResourceId;
    use crate::options::FetchOptions;
    use crate::store::state::settled;
    use serde_json::json;

    const USERS: &str = "users";

    fn in_flight(request: u64) -> InFlight {
        InFlight {
            request: RequestId(request),
            promise: settled(Ok(Value::Null)),
        }
    }

    fn rkey(id: &str) -> ResourceKey {
        ResourceId::from(id).resource_key()
    }

    fn qkey(query: Value) -> QueryKey {
        let mut opts = FetchOptions::new();
        if let Value::Object(map) = query {
            opts.query = map;
        }
        opts.query_key()
    }

    fn collection_target(query: &QueryKey) -> Target {
        Target::LoadCollection {
            collection: CollectionKey::root(),
            query: query.clone(),
            id_key: "id".to_string(),
        }
    }

    fn started(target: Target, request: u64) -> StoreEvent {
        StoreEvent::Started { resource: USERS.into(), target, request: in_flight(request) }
    }

    fn finished(target: Target, request: u64, data: Value) -> StoreEvent {
        StoreEvent::Finished { resource: USERS.into(), target, request: RequestId(request), data }
    }

    fn failed(target: Target, request: u64, error: CacheError) -> StoreEvent {
        StoreEvent::Failed { resource: USERS.into(), target, request: RequestId(request), error }
    }

    fn users(state: &ResourcesState) -> &EntityState {
        state.resource(USERS).unwrap()
    }

    #[test]
    fn test_load_started_and_finished() {
        let mut state = ResourcesState::default();
        state.apply(started(Target::Load(rkey("123")), 1));
        assert!(users(&state).loading.contains_key(&rkey("123")));

        state.apply(finished(Target::Load(rkey("123")), 1, json!({"id": "123", "name": "joe"})));
        let users = users(&state);
        assert!(users.loading.is_empty());
        assert_eq!(
            users.items.get(&rkey("123")),
            Some(&ItemState::Loaded(Arc::new(json!({"id": "123", "name": "joe"}))))
        );
    }

    #[test]
    fn test_stores_by_composite_id() {
        let mut state = ResourcesState::default();
        let key = ResourceId::from_parts([("id", "1"), ("userId", "7")]).resource_key();
        state.apply(finished(Target::Load(key.clone()), 1, json!({"id": "1"})));
        assert!(users(&state).items.contains_key(&key));
    }

    #[test]
    fn test_array_payload_for_single_resource_is_an_error() {
        let mut state = ResourcesState::default();
        state.apply(finished(Target::Load(rkey("123")), 1, json!([{"id": "123"}])));
        assert_eq!(
            users(&state).items.get(&rkey("123")),
            Some(&ItemState::Failed(CacheError::ArrayResponse))
        );
    }

    #[test]
    fn test_success_replaces_prior_error() {
        let mut state = ResourcesState::default();
        state.apply(failed(Target::Load(rkey("1")), 1, CacheError::Transport("down".into())));
        assert!(matches!(users(&state).items.get(&rkey("1")), Some(ItemState::Failed(_))));

        state.apply(finished(Target::Load(rkey("1")), 2, json!({"id": "1"})));
        assert!(matches!(users(&state).items.get(&rkey("1")), Some(ItemState::Loaded(_))));
    }

    #[test]
    fn test_load_error_is_recorded() {
        let mut state = ResourcesState::default();
        state.apply(started(Target::Load(rkey("1")), 1));
        state.apply(failed(Target::Load(rkey("1")), 1, CacheError::Transport("down".into())));
        let users = users(&state);
        assert!(users.loading.is_empty());
        assert_eq!(
            users.items.get(&rkey("1")),
            Some(&ItemState::Failed(CacheError::Transport("down".into())))
        );
    }

    #[test]
    fn test_collection_finished_normalizes_members() {
        let mut state = ResourcesState::default();
        let query = qkey(json!({}));
        state.apply(started(collection_target(&query), 1));
        state.apply(finished(
            collection_target(&query),
            1,
            json!([{"id": "2", "v": 1}, {"id": 1}, {"id": "2", "v": 2}]),
        ));

        let users = users(&state);
        assert!(users.loading_collections.is_empty());
        assert_eq!(
            users.collection(&CollectionKey::root(), &query),
            Some(&CollectionState::Loaded { associated_ids: vec![rkey("2"), rkey("1")] })
        );
        assert_eq!(
            users.items.get(&rkey("2")),
            Some(&ItemState::Loaded(Arc::new(json!({"id": "2", "v": 2}))))
        );
    }

    #[test]
    fn test_collection_member_without_id_fails_the_collection() {
        let mut state = ResourcesState::default();
        let query = qkey(json!({}));
        state.apply(finished(collection_target(&query), 1, json!([{"id": "1"}, {"name": "anon"}])));

        let users = users(&state);
        assert!(users.items.is_empty());
        assert!(matches!(
            users.collection(&CollectionKey::root(), &query),
            Some(CollectionState::Failed(CacheError::IdType(_)))
        ));
    }

    #[test]
    fn test_non_array_collection_payload_is_empty() {
        let mut state = ResourcesState::default();
        let query = qkey(json!({}));
        state.apply(finished(collection_target(&query), 1, json!({"results": []})));
        assert_eq!(
            users(&state).collection(&CollectionKey::root(), &query),
            Some(&CollectionState::Loaded { associated_ids: vec![] })
        );
    }

    #[test]
    fn test_collection_error_is_scoped_to_its_variant() {
        let mut state = ResourcesState::default();
        let a = qkey(json!({"a": 1}));
        let b = qkey(json!({"b": 2}));
        state.apply(finished(collection_target(&a), 1, json!([{"id": "1"}])));
        state.apply(failed(collection_target(&b), 2, CacheError::Transport("down".into())));

        let users = users(&state);
        assert_eq!(
            users.collection(&CollectionKey::root(), &a),
            Some(&CollectionState::Loaded { associated_ids: vec![rkey("1")] })
        );
        assert!(matches!(
            users.collection(&CollectionKey::root(), &b),
            Some(CollectionState::Failed(_))
        ));
        assert!(matches!(users.items.get(&rkey("1")), Some(ItemState::Loaded(_))));
    }

    #[test]
    fn test_create_lifecycle_clears_collections() {
        let mut state = ResourcesState::default();
        let query = qkey(json!({}));
        let create = Target::Create { id_key: "id".into() };
        state.apply(finished(collection_target(&query), 1, json!([{"id": "1"}])));
        state.apply(started(create.clone(), 2));
        assert!(users(&state).is_creating);

        state.apply(finished(create, 2, json!({"id": "9", "name": "new"})));
        let users = users(&state);
        assert!(!users.is_creating);
        assert!(users.collections.is_empty());
        assert!(users.items.contains_key(&rkey("9")));
        assert!(users.items.contains_key(&rkey("1")));
    }

    #[test]
    fn test_create_error_clears_flag_only() {
        let mut state = ResourcesState::default();
        let query = qkey(json!({}));
        let create = Target::Create { id_key: "id".into() };
        state.apply(finished(collection_target(&query), 1, json!([{"id": "1"}])));
        state.apply(started(create.clone(), 2));
        state.apply(failed(create, 2, CacheError::Transport("down".into())));
        let users = users(&state);
        assert!(!users.is_creating);
        assert!(users.collection(&CollectionKey::root(), &query).is_some());
    }

    #[test]
    fn test_update_and_patch_upsert_the_item() {
        let mut state = ResourcesState::default();
        state.apply(started(Target::Update(rkey("1")), 1));
        assert!(users(&state).updating.contains_key(&rkey("1")));
        state.apply(finished(Target::Update(rkey("1")), 1, json!({"id": "1", "v": 1})));
        state.apply(started(Target::Patch(rkey("1")), 2));
        state.apply(finished(Target::Patch(rkey("1")), 2, json!({"id": "1", "v": 2})));

        let users = users(&state);
        assert!(users.updating.is_empty());
        assert_eq!(
            users.items.get(&rkey("1")),
            Some(&ItemState::Loaded(Arc::new(json!({"id": "1", "v": 2}))))
        );
    }

    #[test]
    fn test_update_error_keeps_the_item() {
        let mut state = ResourcesState::default();
        state.apply(finished(Target::Load(rkey("1")), 1, json!({"id": "1"})));
        state.apply(started(Target::Update(rkey("1")), 2));
        state.apply(failed(Target::Update(rkey("1")), 2, CacheError::Transport("down".into())));
        let users = users(&state);
        assert!(users.updating.is_empty());
        assert!(matches!(users.items.get(&rkey("1")), Some(ItemState::Loaded(_))));
    }

    #[test]
    fn test_update_collection_uses_its_own_in_flight_map() {
        let mut state = ResourcesState::default();
        let query = qkey(json!({}));
        let target = Target::UpdateCollection {
            collection: CollectionKey::root(),
            query: query.clone(),
            id_key: "id".into(),
        };
        state.apply(started(target.clone(), 1));
        assert!(users(&state).loading_collections.is_empty());
        assert!(!users(&state).updating_collections.is_empty());

        state.apply(finished(target, 1, json!([{"id": "1"}])));
        let users = users(&state);
        assert!(users.updating_collections.is_empty());
        assert_eq!(
            users.collection(&CollectionKey::root(), &query),
            Some(&CollectionState::Loaded { associated_ids: vec![rkey("1")] })
        );
    }

    #[test]
    fn test_destroy_removes_item_from_every_collection() {
        let mut state = ResourcesState::default();
        let q1 = qkey(json!({"page": 1}));
        let q2 = qkey(json!({"page": 2}));
        state.apply(finished(collection_target(&q1), 1, json!([{"id": "x"}, {"id": "y"}])));
        state.apply(finished(collection_target(&q2), 2, json!([{"id": "y"}])));

        state.apply(started(Target::Destroy(rkey("x")), 3));
        assert!(users(&state).destroying.contains_key(&rkey("x")));
        state.apply(finished(Target::Destroy(rkey("x")), 3, Value::Null));

        let users = users(&state);
        assert!(users.destroying.is_empty());
        assert!(!users.items.contains_key(&rkey("x")));
        assert!(users.items.contains_key(&rkey("y")));
        assert_eq!(
            users.collection(&CollectionKey::root(), &q1),
            Some(&CollectionState::Loaded { associated_ids: vec![rkey("y")] })
        );
        assert_eq!(
            users.collection(&CollectionKey::root(), &q2),
            Some(&CollectionState::Loaded { associated_ids: vec![rkey("y")] })
        );
    }

    #[test]
    fn test_destroy_error_keeps_the_item() {
        let mut state = ResourcesState::default();
        state.apply(finished(Target::Load(rkey("1")), 1, json!({"id": "1"})));
        state.apply(started(Target::Destroy(rkey("1")), 2));
        state.apply(failed(Target::Destroy(rkey("1")), 2, CacheError::Transport("down".into())));
        let users = users(&state);
        assert!(users.destroying.is_empty());
        assert!(users.items.contains_key(&rkey("1")));
    }

    #[test]
    fn test_clear_resource_skips_collection_members() {
        let mut state = ResourcesState::default();
        let query = qkey(json!({}));
        state.apply(finished(collection_target(&query), 1, json!([{"id": "1"}])));
        state.apply(finished(Target::Load(rkey("2")), 2, json!({"id": "2"})));

        state.apply(StoreEvent::ClearResource { resource: USERS.into(), key: rkey("1") });
        state.apply(StoreEvent::ClearResource { resource: USERS.into(), key: rkey("2") });

        let users = users(&state);
        assert!(users.items.contains_key(&rkey("1")));
        assert!(!users.items.contains_key(&rkey("2")));
    }

    #[test]
    fn test_clear_collection_keeps_shared_members() {
        let mut state = ResourcesState::default();
        let a = qkey(json!({"a": 1}));
        let b = qkey(json!({"b": 1}));
        state.apply(finished(collection_target(&a), 1, json!([{"id": "1"}, {"id": "2"}])));
        state.apply(finished(collection_target(&b), 2, json!([{"id": "2"}])));

        state.apply(StoreEvent::ClearCollection {
            resource: USERS.into(),
            collection: CollectionKey::root(),
            query: a.clone(),
        });

        let users = users(&state);
        assert!(users.collection(&CollectionKey::root(), &a).is_none());
        assert!(!users.items.contains_key(&rkey("1")));
        assert!(users.items.contains_key(&rkey("2")));
    }

    #[test]
    fn test_reset_discards_everything() {
        let mut state = ResourcesState::default();
        state.apply(finished(Target::Load(rkey("1")), 1, json!({"id": "1"})));
        state.apply(StoreEvent::Reset);
        assert!(state.resource(USERS).is_none());
    }

    #[test]
    fn test_collection_loading_clears_in_any_completion_order() {
        let mut state = ResourcesState::default();
        let (a, b, c) = (qkey(json!({"a": 1})), qkey(json!({"b": 2})), qkey(json!({"c": 3})));
        state.apply(started(collection_target(&a), 1));
        state.apply(started(collection_target(&b), 2));
        state.apply(started(collection_target(&c), 3));
        state.apply(finished(collection_target(&a), 1, json!([{"id": "a1"}, {"id": "a2"}])));
        state.apply(finished(collection_target(&c), 3, json!([{"id": "c1"}])));
        state.apply(finished(collection_target(&b), 2, json!([{"id": "b1"}, {"id": "a1"}])));

        let users = users(&state);
        assert!(users.loading_collections.is_empty());
        let ids = |query: &QueryKey| {
            users
                .collection(&CollectionKey::root(), query)
                .map(|variant| variant.associated_ids().to_vec())
        };
        assert_eq!(ids(&a), Some(vec![rkey("a1"), rkey("a2")]));
        assert_eq!(ids(&b), Some(vec![rkey("b1"), rkey("a1")]));
        assert_eq!(ids(&c), Some(vec![rkey("c1")]));
    }

    #[test]
    fn test_duplicate_successful_loads_settle() {
        let mut state = ResourcesState::default();
        let (a, b) = (qkey(json!({"a": 1})), qkey(json!({"b": 2})));
        state.apply(started(collection_target(&a), 1));
        state.apply(started(collection_target(&b), 2));
        state.apply(started(collection_target(&a), 3));
        state.apply(started(collection_target(&b), 4));

        state.apply(finished(collection_target(&b), 2, json!([{"id": "1"}])));
        assert!(!users(&state).loading_collections.is_empty());
        state.apply(finished(collection_target(&b), 4, json!([{"id": "2"}])));
        state.apply(finished(collection_target(&a), 1, json!([])));
        state.apply(finished(collection_target(&a), 3, json!([])));

        let users = users(&state);
        assert!(users.loading_collections.is_empty());
        assert_eq!(
            users.collection(&CollectionKey::root(), &b),
            Some(&CollectionState::Loaded { associated_ids: vec![rkey("2")] })
        );
    }

    #[test]
    fn test_duplicate_failed_loads_settle() {
        let mut state = ResourcesState::default();
        let (a, b) = (qkey(json!({"a": 1})), qkey(json!({"b": 2})));
        for (i, query) in [&a, &b, &a, &b].into_iter().enumerate() {
            state.apply(started(collection_target(query), i as u64 + 1));
        }
        for (request, query) in [(2, &b), (4, &b), (1, &a), (3, &a)] {
            state.apply(failed(collection_target(query), request, CacheError::Transport("oh no".into())));
        }
        assert!(users(&state).loading_collections.is_empty());
    }

    #[test]
    fn test_stale_completion_keeps_newer_in_flight_entry() {
        let mut state = ResourcesState::default();
        state.apply(started(Target::Load(rkey("1")), 1));
        state.apply(started(Target::Load(rkey("1")), 2));
        state.apply(finished(Target::Load(rkey("1")), 1, json!({"id": "1"})));
        assert_eq!(
            users(&state).loading.get(&rkey("1")).map(|entry| entry.request),
            Some(RequestId(2))
        );
        state.apply(finished(Target::Load(rkey("1")), 2, json!({"id": "1"})));
        assert!(users(&state).is_settled());
    }

    #[test]
    fn test_one_query_variant_finishing_leaves_sibling_loading() {
        let mut state = ResourcesState::default();
        let root = CollectionKey::root();
        let (a, b) = (qkey(json!({"a": 1})), qkey(json!({"b": 2})));
        state.apply(started(collection_target(&a), 1));
        state.apply(started(collection_target(&b), 2));
        state.apply(finished(collection_target(&a), 1, json!([{"id": "1"}])));

        let users = users(&state);
        assert!(users.items.contains_key(&rkey("1")));
        assert_eq!(
            users.collection(&root, &a),
            Some(&CollectionState::Loaded { associated_ids: vec![rkey("1")] })
        );
        let variants = users.loading_collections.get(&root).unwrap();
        assert!(variants.contains_key(&b));
        assert!(!variants.contains_key(&a));
    }

    #[test]
    fn test_one_scope_finishing_leaves_sibling_scope_loading() {
        let mut state = ResourcesState::default();
        let scope_a = ResourceId::from_parts([("a", "1")]).collection_key();
        let scope_b = ResourceId::from_parts([("b", "2")]).collection_key();
        let query = QueryKey::empty();
        let target = |collection: &CollectionKey| Target::LoadCollection {
            collection: collection.clone(),
            query: query.clone(),
            id_key: "id".into(),
        };
        state.apply(started(target(&scope_a), 1));
        state.apply(started(target(&scope_b), 2));
        state.apply(finished(target(&scope_a), 1, json!([{"id": "1"}])));

        let users = users(&state);
        assert!(users.loading_collections.contains_key(&scope_b));
        assert!(!users.loading_collections.contains_key(&scope_a));
    }

    #[test]
    fn test_older_load_finishing_last_is_discarded() {
        let mut state = ResourcesState::default();
        state.apply(started(Target::Load(rkey("1")), 1));
        state.apply(started(Target::Load(rkey("1")), 2));
        state.apply(finished(Target::Load(rkey("1")), 2, json!({"id": "1", "v": "new"})));
        state.apply(finished(Target::Load(rkey("1")), 1, json!({"id": "1", "v": "old"})));

        let users = users(&state);
        assert!(users.is_settled());
        assert_eq!(
            users.items.get(&rkey("1")),
            Some(&ItemState::Loaded(Arc::new(json!({"id": "1", "v": "new"}))))
        );
    }

    #[test]
    fn test_older_load_failing_last_keeps_newer_item() {
        let mut state = ResourcesState::default();
        state.apply(started(Target::Load(rkey("1")), 1));
        state.apply(started(Target::Load(rkey("1")), 2));
        state.apply(finished(Target::Load(rkey("1")), 2, json!({"id": "1"})));
        state.apply(failed(Target::Load(rkey("1")), 1, CacheError::Transport("down".into())));
        assert!(matches!(users(&state).items.get(&rkey("1")), Some(ItemState::Loaded(_))));
    }

    #[test]
    fn test_older_collection_finishing_last_is_discarded() {
        let mut state = ResourcesState::default();
        let query = qkey(json!({}));
        state.apply(started(collection_target(&query), 1));
        state.apply(started(collection_target(&query), 2));
        state.apply(finished(collection_target(&query), 2, json!([{"id": "1", "v": "new"}])));
        state.apply(finished(
            collection_target(&query),
            1,
            json!([{"id": "1", "v": "old"}, {"id": "2"}]),
        ));

        let users = users(&state);
        assert!(users.loading_collections.is_empty());
        assert_eq!(
            users.collection(&CollectionKey::root(), &query),
            Some(&CollectionState::Loaded { associated_ids: vec![rkey("1")] })
        );
        assert_eq!(
            users.items.get(&rkey("1")),
            Some(&ItemState::Loaded(Arc::new(json!({"id": "1", "v": "new"}))))
        );
        assert!(!users.items.contains_key(&rkey("2")));
    }

    #[test]
    fn test_load_started_before_destroy_does_not_revive_the_item() {
        let mut state = ResourcesState::default();
        state.apply(started(Target::Load(rkey("1")), 1));
        state.apply(started(Target::Destroy(rkey("1")), 2));
        state.apply(finished(Target::Destroy(rkey("1")), 2, Value::Null));
        state.apply(finished(Target::Load(rkey("1")), 1, json!({"id": "1"})));
        assert!(!users(&state).items.contains_key(&rkey("1")));
    }

    #[test]
    fn test_item_event_shares_untouched_maps_with_prior_snapshot() {
        let mut state = ResourcesState::default();
        let query = qkey(json!({}));
        state.apply(finished(collection_target(&query), 1, json!([{"id": "1"}])));
        let snapshot = state.clone();

        state.apply(finished(Target::Load(rkey("2")), 2, json!({"id": "2"})));
        let before = users(&snapshot);
        let after = users(&state);
        assert!(Arc::ptr_eq(&before.collections, &after.collections));
        assert!(!Arc::ptr_eq(&before.items, &after.items));
        assert!(!before.items.contains_key(&rkey("2")));
        assert!(after.items.contains_key(&rkey("2")));
    }
}
