use super::{Fetcher, RawResponse};
use crate::error::CacheError;
use crate::options::{FetchOptions, Method};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use std::time::Duration;

/// Default [`Fetcher`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`CacheError::Transport`] if the underlying client fails to build.
    pub fn new() -> Result<Self, CacheError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .use_rustls_tls()
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                CacheError::Transport(format!("HTTP client build failed: {e}"))
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Keeps transport errors free of request details.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_builder() {
            "invalid request".to_string()
        } else if error.is_body() || error.is_decode() {
            "response body error".to_string()
        } else if error.is_redirect() {
            "too many redirects".to_string()
        } else {
            "network error".to_string()
        }
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<RawResponse, CacheError> {
        let method = reqwest_method(opts.method.unwrap_or(Method::Get));
        let mut request = self.client.request(method, url);
        for (name, value) in &opts.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        match &opts.body {
            Some(Value::String(text)) => request = request.body(text.clone()),
            Some(body) => {
                if !opts.headers.contains_key("content-type") {
                    request = request.header("content-type", "application/json");
                }
                request = request.body(body.to_string());
            }
            None => {}
        }

        let res = request.send().await.map_err(|e| {
            tracing::warn!(url, error = %e, "request failed");
            CacheError::Transport(Self::sanitize_network_error(&e))
        })?;

        let status = res.status();
        let url = res.url().to_string();
        let headers = res
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = res
            .text()
            .await
            .map_err(|e| CacheError::Transport(Self::sanitize_network_error(&e)))?;

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            url,
            headers,
            body,
        })
    }
}
