//! # Resource Registry
//!
//! Describes, per resource type, where its data lives and how responses are
//! shaped.
//!
//! ## Key Types
//!
//! - [`ResourceDefinition`]: the trait every registered resource implements.
//!   Only [`ResourceDefinition::fetch`] is required; `transform_data` and
//!   `id_key` have defaults.
//! - [`Endpoint`]: a ready-made definition for the common case of one URL
//!   template per resource.

use crate::error::CacheError;
use crate::key::ResourceId;
use crate::options::{FetchOptions, Method};
use crate::store::ResourcesState;
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;

/// The kind of request being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    Load,
    LoadCollection,
    Create,
    Update,
    UpdateCollection,
    Destroy,
    Patch,
}

impl ActionType {
    /// Default HTTP method, overridable through options.
    pub fn method(self) -> Method {
        match self {
            ActionType::Load | ActionType::LoadCollection => Method::Get,
            ActionType::Create | ActionType::UpdateCollection => Method::Post,
            ActionType::Update => Method::Put,
            ActionType::Destroy => Method::Delete,
            ActionType::Patch => Method::Patch,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Load => "LOAD",
            ActionType::LoadCollection => "LOAD_COLLECTION",
            ActionType::Create => "CREATE",
            ActionType::Update => "UPDATE",
            ActionType::UpdateCollection => "UPDATE_COLLECTION",
            ActionType::Destroy => "DESTROY",
            ActionType::Patch => "PATCH",
        }
    }

    /// Single-resource actions cannot run without an id.
    pub fn requires_id(self) -> bool {
        matches!(
            self,
            ActionType::Load | ActionType::Update | ActionType::Patch | ActionType::Destroy
        )
    }

    pub fn is_mutation(self) -> bool {
        !matches!(self, ActionType::Load | ActionType::LoadCollection)
    }
}

impl Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URL template and options a definition produces for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTarget {
    pub url: String,
    pub opts: FetchOptions,
}

/// What `transform_data` gets to know about the request.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub id: Option<&'a ResourceId>,
    /// The options passed by the caller, before any merging.
    pub opts: &'a FetchOptions,
    pub action: ActionType,
}

/// A registered resource type.
///
/// # Architecture Note
/// The registry is consulted by the cache actor when it starts a fetch. `fetch`
/// receives the current store snapshot so a definition can derive its URL from
/// already loaded data (e.g. a parent resource).
pub trait ResourceDefinition: Send + Sync {
    fn fetch(&self, id: Option<&ResourceId>, action: ActionType, state: &ResourcesState) -> FetchTarget;

    /// Reshapes a successful response before it is stored and returned.
    fn transform_data(&self, raw: Value, _ctx: &TransformContext<'_>) -> Result<Value, CacheError> {
        Ok(raw)
    }

    /// Field of each collection member that identifies it.
    fn id_key(&self) -> &str {
        "id"
    }
}

type TransformFn = dyn Fn(Value, &TransformContext<'_>) -> Result<Value, CacheError> + Send + Sync;

/// A resource served from a single URL template.
///
/// ```rust
/// use resource_cache::registry::Endpoint;
/// use resource_cache::options::FetchOptions;
///
/// let users = Endpoint::new("http://api.example.com/users/:id")
///     .with_opts(FetchOptions::new().with_header("accept", "application/json"))
///     .with_id_key("userId");
/// ```
#[derive(Clone)]
pub struct Endpoint {
    url: String,
    opts: FetchOptions,
    id_key: String,
    transform: Option<Arc<TransformFn>>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            opts: FetchOptions::default(),
            id_key: "id".to_string(),
            transform: None,
        }
    }

    pub fn with_opts(mut self, opts: FetchOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn with_id_key(mut self, id_key: impl Into<String>) -> Self {
        self.id_key = id_key.into();
        self
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value, &TransformContext<'_>) -> Result<Value, CacheError> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("opts", &self.opts)
            .field("id_key", &self.id_key)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl ResourceDefinition for Endpoint {
    fn fetch(&self, _id: Option<&ResourceId>, _action: ActionType, _state: &ResourcesState) -> FetchTarget {
        FetchTarget {
            url: self.url.clone(),
            opts: self.opts.clone(),
        }
    }

    fn transform_data(&self, raw: Value, ctx: &TransformContext<'_>) -> Result<Value, CacheError> {
        match &self.transform {
            Some(transform) => transform(raw, ctx),
            None => Ok(raw),
        }
    }

    fn id_key(&self) -> &str {
        &self.id_key
    }
}
