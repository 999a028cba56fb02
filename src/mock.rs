//! # Mock Fetcher
//!
//! An in-memory [`Fetcher`] for testing the cache without a network.
//!
//! Expectations are registered up front with a fluent builder and consumed by
//! matching requests. A response can be held back until a gate fires, which
//! lets a test decide the order in which overlapping requests complete.

use crate::error::CacheError;
use crate::fetch::{Fetcher, RawResponse};
use crate::options::{FetchOptions, Method};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

struct Expectation {
    method: Method,
    url: String,
    gate: Option<oneshot::Receiver<()>>,
    response: Result<RawResponse, CacheError>,
}

/// A request the mock received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub opts: FetchOptions,
}

#[derive(Default)]
struct MockState {
    expectations: VecDeque<Expectation>,
    calls: Vec<RecordedCall>,
    unexpected: Vec<String>,
}

/// A fetcher with expectation tracking for fluent testing.
///
/// # Example
/// ```ignore
/// let mock = MockFetcher::new();
/// mock.expect(Method::Get, "http://api/users/1").return_json(json!({"id": "1"}));
///
/// let config = CacheConfig::builder().fetcher(mock.clone()).build()?;
/// // Use the cache in tests...
/// mock.verify(); // Ensures all expectations were met
/// ```
#[derive(Clone, Default)]
pub struct MockFetcher {
    state: Arc<Mutex<MockState>>,
}

impl MockFetcher {
    /// Creates a new mock fetcher with no expectations.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Expects one request with this method and URL.
    pub fn expect(&self, method: Method, url: impl Into<String>) -> ExpectationBuilder {
        ExpectationBuilder {
            state: Arc::clone(&self.state),
            method,
            url: url.into(),
            gate: None,
        }
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Verifies that all expectations were met and nothing else was requested.
    pub fn verify(&self) {
        let state = self.lock();
        if !state.unexpected.is_empty() {
            panic!("Unexpected requests: {:?}", state.unexpected);
        }
        if !state.expectations.is_empty() {
            let remaining: Vec<String> = state
                .expectations
                .iter()
                .map(|e| format!("{} {}", e.method, e.url))
                .collect();
            panic!("Not all expectations were met. {} remaining: {:?}", remaining.len(), remaining);
        }
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<RawResponse, CacheError> {
        let method = opts.method.unwrap_or(Method::Get);
        let expectation = {
            let mut state = self.lock();
            state.calls.push(RecordedCall {
                method,
                url: url.to_string(),
                opts: opts.clone(),
            });
            let position = state
                .expectations
                .iter()
                .position(|e| e.method == method && e.url == url);
            match position.and_then(|i| state.expectations.remove(i)) {
                Some(expectation) => expectation,
                None => {
                    state.unexpected.push(format!("{method} {url}"));
                    return Err(CacheError::Transport(format!("unexpected request: {method} {url}")));
                }
            }
        };

        if let Some(gate) = expectation.gate {
            // A dropped sender releases the response as well.
            let _ = gate.await;
        }
        expectation.response.map(|res| res.with_url(url))
    }
}

/// Builder for one expected request.
pub struct ExpectationBuilder {
    state: Arc<Mutex<MockState>>,
    method: Method,
    url: String,
    gate: Option<oneshot::Receiver<()>>,
}

impl ExpectationBuilder {
    /// Holds the response back until `gate` fires.
    pub fn after(mut self, gate: oneshot::Receiver<()>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Responds `200 OK` with a JSON body.
    pub fn return_json(self, body: Value) {
        self.return_response(RawResponse::json(200, &body));
    }

    /// Responds with `status` and a JSON body.
    pub fn return_status(self, status: u16, body: Value) {
        self.return_response(RawResponse::json(status, &body));
    }

    /// Responds `200 OK` with a plain-text body.
    pub fn return_text(self, body: impl Into<String>) {
        self.return_response(RawResponse::new(200, body).with_header("content-type", "text/plain"));
    }

    pub fn return_response(self, response: RawResponse) {
        self.push(Ok(response));
    }

    /// Fails the request as if the network were down.
    pub fn return_err(self, error: CacheError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<RawResponse, CacheError>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.expectations.push_back(Expectation {
            method: self.method,
            url: self.url,
            gate: self.gate,
            response,
        });
    }
}
