//! HTTP concerns: error classification and the transport abstraction
//!
//! This module provides:
//! - Classification of failed exchanges into the provider-agnostic taxonomy
//! - A transport trait with a chunk-level "bytes received" notification,
//!   which is where cooperative cancellation is observed

pub mod classify;
pub mod transport;

pub use classify::{classify, ClassifiedError, ErrorKind};
pub use transport::{
    join_url, ChunkObserver, HttpTransport, Transport, TransportRequest, TransportResponse,
};
