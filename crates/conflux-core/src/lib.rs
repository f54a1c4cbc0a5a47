//! Conflux Core - Request execution and response normalization engine
//!
//! This crate lets an application issue chat, image, structured-JSON, and
//! file/stream operations against multiple incompatible AI provider APIs
//! through one contract, while tracking each call for cooperative
//! cancellation and normalizing wildly different response shapes into a
//! predictable structure.
//!
//! # Main Components
//!
//! - **RequestTracker**: thread-safe registry of in-flight operations and
//!   their cancellation flags
//! - **Dispatcher**: one worker task per request, with the sequencing
//!   contract (exactly one terminal notification, cancelled requests
//!   deliver nothing, tracker entries always retired)
//! - **EventInvoker**: callback delivery with explicit thread-affinity
//!   policy
//! - **normalize**: heuristic extraction of tabular data from
//!   heterogeneous or free-text-wrapped provider JSON
//! - **http::classify**: provider-agnostic error classification
//!
//! Drivers implementing [`ProviderDriver`] build request bodies, obtain a
//! tracked handle, run the exchange through the dispatcher, and report
//! through the callback sinks.

pub mod dispatch;
pub mod driver;
pub mod error;
pub mod http;
pub mod invoke;
pub mod normalize;
pub mod sink;
pub mod tracker;
pub mod types;

pub use dispatch::Dispatcher;
pub use driver::{DriverContext, ProviderDriver};
pub use error::{Error, Result};
pub use http::{
    classify, join_url, ChunkObserver, ClassifiedError, ErrorKind, HttpTransport, Transport,
    TransportRequest, TransportResponse,
};
pub use invoke::{AffinityExecutor, CallbackExecutor, EventInvoker, InlineExecutor};
pub use normalize::{Envelope, Extraction, RowSource};
pub use sink::{
    ChatSink, ErrorSink, ImageDecodeMode, ImagePayload, ImageSink, JsonSink, StreamSink,
};
pub use tracker::{CancelToken, RequestHandle, RequestId, RequestTracker};
pub use types::{
    ChatMessage, ChatRequest, DriverConfig, ImageRequest, JsonRequest, StreamRequest,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
