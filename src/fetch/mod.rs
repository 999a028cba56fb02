//! # Fetch Layer
//!
//! The network boundary of the cache.
//!
//! ## Key Types
//!
//! - [`Fetcher`]: the injectable transport. The cache never talks to the
//!   network except through this trait.
//! - [`RawResponse`]: what a fetcher hands back, before any interpretation.
//! - [`extract_data`]: turns a raw response into a JSON value or a
//!   [`CacheError::Http`].
//! - [`ComposeFetch`]: a hook that wraps the selected fetcher, e.g. to add
//!   auth headers or logging.

pub mod http;

pub use http::HttpFetcher;

use crate::error::CacheError;
use crate::options::FetchOptions;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The transport used to execute a request.
///
/// # Architecture Note
/// The cache only needs "send this request, give me status, headers and body".
/// Keeping that behind a trait lets tests swap in
/// [`MockFetcher`](crate::mock::MockFetcher) and lets hosts bring their own
/// client without the cache knowing about it.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<RawResponse, CacheError>;
}

/// Wraps the fetcher selected for a request.
pub type ComposeFetch = Arc<dyn Fn(Arc<dyn Fetcher>) -> Arc<dyn Fetcher> + Send + Sync>;

/// An uninterpreted HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub url: String,
    /// Header names are lower-case.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RawResponse {
    /// A response with the canonical reason phrase for `status` and no headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            status_text,
            url: String::new(),
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// A response carrying `value` as an `application/json` body.
    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status, value.to_string()).with_header("Content-Type", "application/json")
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Interprets a response body.
///
/// The body is parsed as JSON when the content type starts with
/// `application/json` and returned as a JSON string otherwise. A non-2xx
/// status becomes [`CacheError::Http`] carrying the interpreted body.
pub fn extract_data(res: RawResponse) -> Result<Value, CacheError> {
    let is_json = res
        .content_type()
        .is_some_and(|ct| ct.starts_with("application/json"));

    let body = if !is_json {
        Value::String(res.body)
    } else if res.body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&res.body).map_err(|e| CacheError::Decode(e.to_string()))?
    };

    if (200..300).contains(&res.status) {
        Ok(body)
    } else {
        Err(CacheError::Http {
            message: format!("{} ({})", res.status_text, res.url),
            status: res.status,
            body,
        })
    }
}
