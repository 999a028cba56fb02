//! # Cache Actor
//!
//! The single owner of the store.
//!
//! **Concurrency Model**:
//! The actor processes its messages *sequentially*. A request's decision
//! (cached, in flight, or new fetch) and the `Started` event of a new fetch
//! happen in the same step, so a second caller arriving right after always
//! sees the first request in flight. No `Mutex` guards the store: readers get
//! immutable snapshots through a `watch` channel.

use crate::client::CacheClient;
use crate::config::CacheConfig;
use crate::error::{CacheError, IdTypeError};
use crate::fetch::extract_data;
use crate::key::ResourceId;
use crate::message::{CacheRequest, Operation};
use crate::registry::{ActionType, ResourceDefinition, TransformContext};
use crate::store::{settled, InFlight, Pending, RequestId, ResourcesState, StoreEvent, Target};
use crate::url::build_fetch_url;
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

pub struct CacheActor {
    receiver: mpsc::UnboundedReceiver<CacheRequest>,
    /// Handed to fetch tasks so they can report back. Weak, so the actor does
    /// not keep its own channel open.
    sender: mpsc::WeakUnboundedSender<CacheRequest>,
    state: Arc<ResourcesState>,
    publisher: watch::Sender<Arc<ResourcesState>>,
    next_request: u64,
}

impl CacheActor {
    pub fn new() -> (Self, CacheClient) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let state = Arc::new(ResourcesState::default());
        let (publisher, snapshots) = watch::channel(Arc::clone(&state));
        let actor = Self {
            receiver,
            sender: sender.downgrade(),
            state,
            publisher,
            next_request: 0,
        };
        (actor, CacheClient::new(sender, snapshots))
    }

    /// Runs until every client and every in-flight fetch has let go of the
    /// channel.
    ///
    /// # Context Injection
    /// The configuration is injected here rather than in `new`, so clients can
    /// exist (and be captured by fetchers or definitions) before it is built.
    pub async fn run(mut self, config: CacheConfig) {
        let config = Arc::new(config);
        info!(?config, "Cache actor started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                CacheRequest::Execute { operation, respond_to } => {
                    let promise = self.execute(operation, &config);
                    let _ = respond_to.send(promise);
                }
                CacheRequest::Dispatch(event) => self.dispatch(event),
            }
        }

        let resources = self.state.resource_types().count();
        info!(resources, "Cache actor shutdown");
    }

    fn dispatch(&mut self, event: StoreEvent) {
        Arc::make_mut(&mut self.state).apply(event);
        self.publisher.send_replace(Arc::clone(&self.state));
    }

    fn execute(&mut self, op: Operation, config: &Arc<CacheConfig>) -> Pending {
        let resource = op.resource.as_str();
        let Some(definition) = config.resource(resource) else {
            warn!(resource, action = %op.action, "Unknown resource");
            return settled(Err(CacheError::UnknownResource(op.resource)));
        };
        if op.id.is_none() && op.action.requires_id() {
            warn!(resource, action = %op.action, "Missing resource id");
            return settled(Err(IdTypeError::new("null").into()));
        }

        if !op.force_fetch {
            if let Some(reused) = self.reuse(&op) {
                return reused;
            }
        }
        self.start_fetch(op, definition, config)
    }

    /// A cached result or the in-flight handle for a load, if there is one.
    fn reuse(&self, op: &Operation) -> Option<Pending> {
        let resource = op.resource.as_str();
        let id = op.id.clone().unwrap_or_default();
        match op.action {
            ActionType::Load => {
                let key = id.resource_key();
                if let Some(cached) = self.state.get_resource(resource, &key) {
                    debug!(resource, %key, "Cache hit");
                    return Some(settled(cached.map(|value| (*value).clone())));
                }
                let promise = self.state.resource_load_promise(resource, &key)?;
                debug!(resource, %key, "Joined in-flight load");
                Some(promise)
            }
            ActionType::LoadCollection => {
                let collection = id.collection_key();
                let query = op.opts.query_key();
                if self.state.collection_is_loaded(resource, &collection, &query) {
                    debug!(resource, %collection, %query, "Cache hit");
                    let members = self
                        .state
                        .get_collection(resource, &collection, &query)
                        .map(|members| Value::Array(members.iter().map(|v| (**v).clone()).collect()));
                    return Some(settled(members));
                }
                let promise = self.state.collection_load_promise(resource, &collection, &query)?;
                debug!(resource, %collection, %query, "Joined in-flight load");
                Some(promise)
            }
            _ => None,
        }
    }

    fn start_fetch(&mut self, op: Operation, definition: Arc<dyn ResourceDefinition>, config: &Arc<CacheConfig>) -> Pending {
        let Some(sender) = self.sender.upgrade() else {
            return settled(Err(CacheError::ActorClosed));
        };
        self.next_request += 1;
        let request = RequestId(self.next_request);
        let target = target_of(&op, definition.id_key());

        let promise = fetch_data(&op, definition, config, &self.state).boxed().shared();
        debug!(resource = %op.resource, action = %op.action, request = request.0, "Fetch started");
        self.dispatch(StoreEvent::Started {
            resource: op.resource.clone(),
            target: target.clone(),
            request: InFlight {
                request,
                promise: promise.clone(),
            },
        });

        let resource = op.resource;
        let action = target.action();
        let outcome = promise.clone();
        tokio::spawn(async move {
            let event = match outcome.await {
                Ok(data) => {
                    if action.is_mutation() {
                        info!(resource = %resource, %action, request = request.0, "Fetch finished");
                    } else {
                        debug!(resource = %resource, %action, request = request.0, "Fetch finished");
                    }
                    StoreEvent::Finished { resource, target, request, data }
                }
                Err(error) => {
                    warn!(resource = %resource, %action, request = request.0, %error, "Fetch failed");
                    StoreEvent::Failed { resource, target, request, error }
                }
            };
            let _ = sender.send(CacheRequest::Dispatch(event));
        });

        promise
    }
}

fn target_of(op: &Operation, id_key: &str) -> Target {
    let id = op.id.clone().unwrap_or_default();
    match op.action {
        ActionType::Load => Target::Load(id.resource_key()),
        ActionType::LoadCollection => Target::LoadCollection {
            collection: id.collection_key(),
            query: op.opts.query_key(),
            id_key: id_key.to_string(),
        },
        ActionType::Create => Target::Create {
            id_key: id_key.to_string(),
        },
        ActionType::Update => Target::Update(id.resource_key()),
        ActionType::Patch => Target::Patch(id.resource_key()),
        ActionType::UpdateCollection => Target::UpdateCollection {
            collection: id.collection_key(),
            query: op.opts.query_key(),
            id_key: id_key.to_string(),
        },
        ActionType::Destroy => Target::Destroy(id.resource_key()),
    }
}

/// Resolves URL, options and fetcher now, against the current state, and
/// returns the future that performs the request.
fn fetch_data(
    op: &Operation,
    definition: Arc<dyn ResourceDefinition>,
    config: &CacheConfig,
    state: &ResourcesState,
) -> impl std::future::Future<Output = Result<Value, CacheError>> + Send + 'static {
    let target = definition.fetch(op.id.as_ref(), op.action, state);
    let merged = crate::options::FetchOptions::new()
        .with_method(op.action.method())
        .merge(config.default_opts())
        .merge(&target.opts)
        .merge(&op.opts);
    let url = build_fetch_url(&target.url, op.id.as_ref(), &merged.query);
    let fetcher = config.select_fetcher(op.fetcher.clone());

    let id: Option<ResourceId> = op.id.clone();
    let opts = op.opts.clone();
    let action = op.action;
    async move {
        let res = fetcher.fetch(&url, &merged).await?;
        let raw = extract_data(res)?;
        let ctx = TransformContext {
            id: id.as_ref(),
            opts: &opts,
            action,
        };
        definition.transform_data(raw, &ctx)
    }
}
