//! # Cache Errors
//!
//! This module defines the error types used throughout the cache. Every failure
//! the store can record is a [`CacheError`], which is `Clone` so the same error
//! can be handed to every caller waiting on a shared in-flight request and kept
//! in the store at the same time.

use serde_json::Value;

/// Raised by the key deriver when an identifier is not a string, a number, or a
/// flat object of string/number parts.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error(
    "Collection response must be an array of objects containing a unique id key (either \"id\" by default, or a custom \"idKey\" of your choice). The ID must be an object, number, or string. For non-compliant API responses, you can transform the data using a custom \"transformData\" function. (got {found})"
)]
pub struct IdTypeError {
    /// Short description of the rejected value (`null`, `boolean`, ...).
    pub found: &'static str,
}

impl IdTypeError {
    pub fn new(found: &'static str) -> Self {
        Self { found }
    }
}

/// Errors produced or recorded by the cache.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum CacheError {
    #[error(transparent)]
    IdType(#[from] IdTypeError),

    /// A single-resource request answered with an array.
    #[error("Resource call must return an object, not an array")]
    ArrayResponse,

    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Http {
        message: String,
        status: u16,
        body: Value,
    },

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response claimed to be JSON but could not be parsed.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// Raised by a resource's `transform_data` hook.
    #[error("Transform error: {0}")]
    Transform(String),

    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    #[error("Cache actor closed")]
    ActorClosed,

    #[error("Cache actor dropped response channel")]
    ActorDropped,
}

impl CacheError {
    /// HTTP status attached to the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            CacheError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body attached to the error.
    pub fn body(&self) -> Option<&Value> {
        match self {
            CacheError::Http { body, .. } => Some(body),
            _ => None,
        }
    }
}
