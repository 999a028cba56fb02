//! # Cache Configuration
//!
//! [`CacheConfig`] is built once and handed to the cache actor when it starts.
//! There is no global configuration.

use crate::error::CacheError;
use crate::fetch::{ComposeFetch, Fetcher, HttpFetcher};
use crate::options::FetchOptions;
use crate::registry::ResourceDefinition;
use std::collections::HashMap;
use std::sync::Arc;

pub struct CacheConfig {
    resources: HashMap<String, Arc<dyn ResourceDefinition>>,
    default_opts: FetchOptions,
    fetcher: Arc<dyn Fetcher>,
    compose_fetch: Option<ComposeFetch>,
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    pub fn resource(&self, name: &str) -> Option<Arc<dyn ResourceDefinition>> {
        self.resources.get(name).cloned()
    }

    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn default_opts(&self) -> &FetchOptions {
        &self.default_opts
    }

    /// The fetcher for one request: `requested` or the default, wrapped by the
    /// compose hook when one is set.
    pub fn select_fetcher(&self, requested: Option<Arc<dyn Fetcher>>) -> Arc<dyn Fetcher> {
        let selected = requested.unwrap_or_else(|| Arc::clone(&self.fetcher));
        match &self.compose_fetch {
            Some(compose) => compose(selected),
            None => selected,
        }
    }
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.resource_names().collect();
        names.sort_unstable();
        f.debug_struct("CacheConfig")
            .field("resources", &names)
            .field("default_opts", &self.default_opts)
            .field("compose_fetch", &self.compose_fetch.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct CacheConfigBuilder {
    resources: HashMap<String, Arc<dyn ResourceDefinition>>,
    default_opts: FetchOptions,
    fetcher: Option<Arc<dyn Fetcher>>,
    compose_fetch: Option<ComposeFetch>,
}

impl CacheConfigBuilder {
    pub fn resource(mut self, name: impl Into<String>, definition: impl ResourceDefinition + 'static) -> Self {
        self.resources.insert(name.into(), Arc::new(definition));
        self
    }

    /// Options applied to every request, below resource and call options.
    pub fn default_opts(mut self, opts: FetchOptions) -> Self {
        self.default_opts = opts;
        self
    }

    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    pub fn compose_fetch<F>(mut self, compose: F) -> Self
    where
        F: Fn(Arc<dyn Fetcher>) -> Arc<dyn Fetcher> + Send + Sync + 'static,
    {
        self.compose_fetch = Some(Arc::new(compose));
        self
    }

    /// # Errors
    ///
    /// Fails only when no fetcher was given and the default HTTP client cannot
    /// be built.
    pub fn build(self) -> Result<CacheConfig, CacheError> {
        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new()?),
        };
        Ok(CacheConfig {
            resources: self.resources,
            default_opts: self.default_opts,
            fetcher,
            compose_fetch: self.compose_fetch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockFetcher;
    use crate::registry::Endpoint;

    #[test]
    fn test_builder_registers_resources() {
        let config = CacheConfig::builder()
            .resource("users", Endpoint::new("/users/:id"))
            .resource("posts", Endpoint::new("/posts/:id"))
            .fetcher(MockFetcher::new())
            .build()
            .unwrap();
        assert!(config.resource("users").is_some());
        assert!(config.resource("comments").is_none());
        assert_eq!(config.resource_names().count(), 2);
    }

    #[test]
    fn test_default_opts_deserialize_from_json() {
        let opts: FetchOptions =
            serde_json::from_str(r#"{"headers": {"accept": "application/json"}}"#).unwrap();
        let config = CacheConfig::builder()
            .default_opts(opts)
            .fetcher(MockFetcher::new())
            .build()
            .unwrap();
        assert_eq!(
            config.default_opts().headers.get("accept").map(String::as_str),
            Some("application/json")
        );
    }
}
