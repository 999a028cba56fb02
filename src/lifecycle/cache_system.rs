use crate::actor::CacheActor;
use crate::client::CacheClient;
use crate::config::CacheConfig;
use tracing::{error, info};

/// Owns the running cache actor.
///
/// `CacheSystem` is responsible for:
/// - **Lifecycle Management**: spawning the actor and waiting for it on shutdown
/// - **Dependency Wiring**: injecting the [`CacheConfig`] into the actor loop
///
/// # Example
///
/// ```ignore
/// let config = CacheConfig::builder()
///     .resource("users", Endpoint::new("http://api.example.com/users/:id"))
///     .build()?;
/// let system = CacheSystem::new(config);
///
/// let user = system.client.load_resource("users", ResourceId::from(1), FetchOptions::new(), false).await?;
///
/// system.shutdown().await?;
/// ```
pub struct CacheSystem {
    /// Client for interacting with the cache actor
    pub client: CacheClient,

    handle: tokio::task::JoinHandle<()>,
}

impl CacheSystem {
    /// Spawns the cache actor. Must be called inside a Tokio runtime.
    pub fn new(config: CacheConfig) -> Self {
        let (actor, client) = CacheActor::new();
        let handle = tokio::spawn(actor.run(config));
        Self { client, handle }
    }

    /// Gracefully shuts down the cache.
    ///
    /// # Shutdown Process
    ///
    /// Dropping the client closes this side of the channel. The actor keeps
    /// running until every cloned client is gone and every in-flight fetch has
    /// delivered its result, then exits its loop.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if the actor shut down cleanly
    /// - `Err(String)` if the actor task panicked
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down cache...");
        drop(self.client);

        if let Err(e) = self.handle.await {
            error!("Cache actor task failed: {:?}", e);
            return Err(format!("Cache actor task failed: {:?}", e));
        }

        info!("Cache shutdown complete.");
        Ok(())
    }
}
