//! Error types for the Conflux core library
//!
//! This module defines the provider-agnostic error taxonomy that every
//! driver funnels its failures through, so callers observe one error
//! vocabulary regardless of backend.

use thiserror::Error;

use crate::http::classify::ClassifiedError;

/// Main error type for Conflux operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required setting is missing or unusable, detected before any
    /// network call
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Malformed caller input
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Network failure before any response was received
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Non-2xx response with full HTTP context retained
    #[error("{0}")]
    Http(ClassifiedError),

    /// HTTP 401/403, full HTTP context retained
    #[error("{0}")]
    Auth(ClassifiedError),

    /// HTTP 429, full HTTP context retained
    #[error("{0}")]
    RateLimit(ClassifiedError),

    /// Request timed out (HTTP 408/504 or transport deadline); carries the
    /// message only, HTTP context is dropped
    #[error("Timeout: {message}")]
    Timeout { message: String },

    /// Required content failed to parse as JSON
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Unknown provider name or driver setup failure
    #[error("Registration error: no driver registered under {name:?}")]
    Registration { name: String },

    /// A caller-supplied event handler panicked during delivery
    #[error("Event handler failed: {message}")]
    EventHandler { message: String },

    /// Operation not implemented for this provider
    #[error("Unsupported operation: {operation} is not implemented for provider {provider:?}")]
    Unsupported {
        operation: &'static str,
        provider: String,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The classified HTTP context, when this error carries one.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            Error::Http(c) | Error::Auth(c) | Error::RateLimit(c) => Some(c),
            _ => None,
        }
    }
}
