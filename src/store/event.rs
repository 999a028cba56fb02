use super::state::{InFlight, RequestId};
use crate::error::CacheError;
use crate::key::{CollectionKey, QueryKey, ResourceKey};
use crate::registry::ActionType;
use serde_json::Value;

/// The key scope a request acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Load(ResourceKey),
    LoadCollection {
        collection: CollectionKey,
        query: QueryKey,
        id_key: String,
    },
    Create {
        id_key: String,
    },
    Update(ResourceKey),
    Patch(ResourceKey),
    UpdateCollection {
        collection: CollectionKey,
        query: QueryKey,
        id_key: String,
    },
    Destroy(ResourceKey),
}

impl Target {
    pub fn action(&self) -> ActionType {
        match self {
            Target::Load(_) => ActionType::Load,
            Target::LoadCollection { .. } => ActionType::LoadCollection,
            Target::Create { .. } => ActionType::Create,
            Target::Update(_) => ActionType::Update,
            Target::Patch(_) => ActionType::Patch,
            Target::UpdateCollection { .. } => ActionType::UpdateCollection,
            Target::Destroy(_) => ActionType::Destroy,
        }
    }
}

/// Every state change of the store.
///
/// A request produces exactly one `Started` and, once its fetch settles,
/// exactly one `Finished` or `Failed` carrying the same [`RequestId`].
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Started {
        resource: String,
        target: Target,
        request: InFlight,
    },
    Finished {
        resource: String,
        target: Target,
        request: RequestId,
        data: Value,
    },
    Failed {
        resource: String,
        target: Target,
        request: RequestId,
        error: CacheError,
    },
    ClearResource {
        resource: String,
        key: ResourceKey,
    },
    ClearCollection {
        resource: String,
        collection: CollectionKey,
        query: QueryKey,
    },
    Reset,
}
