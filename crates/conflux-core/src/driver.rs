//! The provider driver seam
//!
//! A driver implements one concrete provider's endpoint calls on top of the
//! core components. The capability surface is closed: each operation
//! defaults to an explicit `Unsupported` result instead of a forced
//! override that throws.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::http::{classify, join_url, ChunkObserver, Transport, TransportRequest};
use crate::normalize::{self, Envelope};
use crate::sink::{ChatSink, ErrorSink, ImageSink, JsonSink, StreamSink};
use crate::tracker::{RequestHandle, RequestId};
use crate::types::{ChatRequest, DriverConfig, ImageRequest, JsonRequest, StreamRequest};

/// Unified operation interface over one provider.
///
/// Every operation dispatches onto a worker task and reports its outcome
/// through the sink; the returned id is live immediately and can be passed
/// to the tracker's `cancel`.
#[async_trait]
pub trait ProviderDriver: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, request: ChatRequest, sink: Arc<dyn ChatSink>) -> Result<RequestId> {
        let _ = (request, sink);
        Err(self.unsupported("chat"))
    }

    async fn image(&self, request: ImageRequest, sink: Arc<dyn ImageSink>) -> Result<RequestId> {
        let _ = (request, sink);
        Err(self.unsupported("image"))
    }

    async fn exec_json(&self, request: JsonRequest, sink: Arc<dyn JsonSink>) -> Result<RequestId> {
        let _ = (request, sink);
        Err(self.unsupported("exec_json"))
    }

    async fn transform_stream(
        &self,
        request: StreamRequest,
        sink: Arc<dyn StreamSink>,
    ) -> Result<RequestId> {
        let _ = (request, sink);
        Err(self.unsupported("transform_stream"))
    }
}

/// Blanket helper so default operation bodies stay one line.
trait UnsupportedOp {
    fn unsupported(&self, operation: &'static str) -> Error;
}

impl<D: ProviderDriver + ?Sized> UnsupportedOp for D {
    fn unsupported(&self, operation: &'static str) -> Error {
        Error::Unsupported {
            operation,
            provider: self.name().to_string(),
        }
    }
}

/// Shared plumbing every driver builds on: configuration, the dispatcher
/// (which owns the tracker and invoker), and the transport.
#[derive(Clone)]
pub struct DriverContext {
    pub config: DriverConfig,
    pub dispatcher: Dispatcher,
    pub transport: Arc<dyn Transport>,
}

impl DriverContext {
    pub fn new(config: DriverConfig, dispatcher: Dispatcher, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            dispatcher,
            transport,
        }
    }

    /// Resolve an endpoint path against the configured base URL.
    pub fn endpoint(&self, path: &str) -> Result<String> {
        join_url(&self.config.base_url, path)
    }

    /// Pre-flight check for a required configuration value.
    pub fn require(&self, setting: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(Error::Configuration {
                message: format!("required setting {:?} is not set", setting),
            });
        }
        Ok(())
    }

    pub fn begin(&self) -> (RequestId, RequestHandle) {
        self.dispatcher.tracker().begin_request()
    }

    /// Report a pre-flight failure through the sink channel and hand the
    /// same error back for the direct caller.
    pub fn preflight_fail<S>(&self, sink: &Arc<S>, error: Error) -> Error
    where
        S: ErrorSink + ?Sized + 'static,
    {
        self.dispatcher.deliver_error(sink, &error);
        error
    }

    /// Deliver a lifecycle hook through the invoker, re-routing a failing
    /// hook to the sink's error channel.
    pub fn fire_hook<S, F>(&self, sink: &Arc<S>, hook: F)
    where
        S: ErrorSink + ?Sized + 'static,
        F: FnOnce(&S) + Send + 'static,
    {
        let hook_sink = sink.clone();
        if let Err(error) = self
            .dispatcher
            .invoker()
            .invoke(Box::new(move || hook(&hook_sink)))
        {
            self.dispatcher.deliver_error(sink, &error);
        }
    }

    /// Dispatch an exchange whose body is JSON, with a caller-supplied
    /// terminal delivery. Non-2xx statuses are classified before delivery.
    pub fn run_value<S, D>(
        &self,
        request: TransportRequest,
        on_chunk: Option<ChunkObserver>,
        deliver: D,
        sink: Arc<S>,
    ) -> RequestId
    where
        S: ErrorSink + ?Sized + 'static,
        D: FnOnce(&S, Result<Value>) + Send + 'static,
    {
        let (id, handle) = self.begin();
        let transport = self.transport.clone();
        let cancel = handle.cancel_token().clone();
        let work = async move {
            let response = transport.exchange(request, cancel, on_chunk).await?;
            if !response.is_success() {
                return Err(Error::from(classify(
                    response.status,
                    &response.body_text(),
                    &response.headers,
                )));
            }
            response.body_json()
        };
        self.dispatcher.run(handle, work, deliver, sink);
        id
    }

    /// Dispatch a chat exchange: lifecycle hooks around scheduling, partial
    /// text forwarded while streaming, then the terminal response pair
    /// (`on_response` with the envelope text, `on_full_response` with the
    /// raw document).
    pub fn run_chat(
        &self,
        envelope: Envelope,
        request: TransportRequest,
        stream: bool,
        sink: Arc<dyn ChatSink>,
    ) -> RequestId {
        self.fire_hook(&sink, |s| s.before_request());
        let on_chunk = stream.then(|| self.partial_text_observer(sink.clone()));
        let id = self.run_value(
            request,
            on_chunk,
            move |sink, result| match result {
                Ok(json) => {
                    sink.before_response();
                    let text = envelope.texts(&json).concat();
                    sink.on_response(&text);
                    sink.on_full_response(&json);
                    sink.after_response();
                }
                Err(e) => sink.on_error(&e.to_string()),
            },
            sink.clone(),
        );
        self.fire_hook(&sink, |s| s.after_request());
        id
    }

    /// Dispatch an arbitrary structured-JSON exchange: extracted rows are
    /// offered to `populate_dataset`, then the raw document is the terminal
    /// success either way.
    pub fn run_json(
        &self,
        envelope: Envelope,
        request: TransportRequest,
        sink: Arc<dyn JsonSink>,
    ) -> RequestId {
        self.run_value(
            request,
            None,
            move |sink, result| match result {
                Ok(json) => {
                    let extraction = normalize::extract(envelope, &json);
                    let rows = Value::Array(extraction.rows);
                    if !sink.populate_dataset(&rows) {
                        tracing::debug!("sink declined extracted rows");
                    }
                    sink.on_success(&json);
                }
                Err(e) => sink.on_error(&e.to_string()),
            },
            sink,
        )
    }

    /// Dispatch a raw byte exchange: chunks are forwarded as partials, the
    /// fully received payload is the terminal success.
    pub fn run_stream(&self, request: TransportRequest, sink: Arc<dyn StreamSink>) -> RequestId {
        let (id, handle) = self.begin();
        let transport = self.transport.clone();
        let cancel = handle.cancel_token().clone();

        let invoker = self.dispatcher.invoker().clone();
        let partial_sink = sink.clone();
        let on_chunk: ChunkObserver = Arc::new(move |bytes: &[u8]| {
            let chunk = bytes.to_vec();
            let sink = partial_sink.clone();
            if let Err(error) = invoker.invoke(Box::new(move || sink.on_partial(&chunk))) {
                tracing::warn!(%error, "partial delivery failed");
            }
        });

        let work = async move {
            let response = transport.exchange(request, cancel, Some(on_chunk)).await?;
            if !response.is_success() {
                return Err(Error::from(classify(
                    response.status,
                    &response.body_text(),
                    &response.headers,
                )));
            }
            Ok(response.body)
        };
        self.dispatcher.run(
            handle,
            work,
            |sink, result: Result<Vec<u8>>| match result {
                Ok(bytes) => sink.on_success(&bytes),
                Err(e) => sink.on_error(&e.to_string()),
            },
            sink,
        );
        id
    }

    fn partial_text_observer(&self, sink: Arc<dyn ChatSink>) -> ChunkObserver {
        let invoker = self.dispatcher.invoker().clone();
        Arc::new(move |bytes: &[u8]| {
            let text = String::from_utf8_lossy(bytes).into_owned();
            let sink = sink.clone();
            if let Err(error) = invoker.invoke(Box::new(move || sink.on_partial(&text))) {
                tracing::warn!(%error, "partial delivery failed");
            }
        })
    }
}
