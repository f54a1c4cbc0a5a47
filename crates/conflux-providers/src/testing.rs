//! Shared test doubles for driver tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;

use conflux_core::{
    CancelToken, ChunkObserver, Dispatcher, DriverConfig, DriverContext, Error, EventInvoker,
    RequestTracker, Result, Transport, TransportRequest, TransportResponse,
};

/// Transport that replays one canned response, recording what it was asked
/// to send. The body is emitted as a single chunk, with the cancel flag
/// checked at that chunk boundary like the real transport does.
pub(crate) struct ScriptedTransport {
    status: u16,
    body: Vec<u8>,
    delay: Duration,
    seen: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn json(status: u16, body: &Value) -> Self {
        Self::bytes(status, serde_json::to_vec(body).expect("fixture serializes"))
    }

    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            body,
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn exchange(
        &self,
        request: TransportRequest,
        cancel: CancelToken,
        on_chunk: Option<ChunkObserver>,
    ) -> Result<TransportResponse> {
        self.seen.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if cancel.is_cancelled() {
            return Err(Error::Transport {
                message: "transfer aborted at chunk boundary after cancellation".to_string(),
                source: None,
            });
        }
        if let Some(observer) = &on_chunk {
            observer(&self.body);
        }
        Ok(TransportResponse {
            status: self.status,
            headers: HeaderMap::new(),
            body: self.body.clone(),
        })
    }
}

pub(crate) fn test_config() -> DriverConfig {
    DriverConfig {
        base_url: "https://api.test.local/v1/".to_string(),
        api_key: "sk-test".to_string(),
        model: "test-model".to_string(),
        timeout_secs: 5,
    }
}

pub(crate) fn scripted_context(
    transport: ScriptedTransport,
) -> (DriverContext, Arc<ScriptedTransport>) {
    scripted_context_with(test_config(), transport)
}

pub(crate) fn scripted_context_with(
    config: DriverConfig,
    transport: ScriptedTransport,
) -> (DriverContext, Arc<ScriptedTransport>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let transport = Arc::new(transport);
    let tracker = Arc::new(RequestTracker::new());
    let context = DriverContext::new(
        config,
        Dispatcher::new(tracker, EventInvoker::inline()),
        transport.clone(),
    );
    (context, transport)
}

pub(crate) fn context_with_transport(config: DriverConfig) -> DriverContext {
    scripted_context_with(config, ScriptedTransport::json(200, &serde_json::json!({}))).0
}

/// Wait until every worker task has retired its tracker entry.
pub(crate) async fn drain(tracker: &Arc<RequestTracker>) {
    for _ in 0..400 {
        if tracker.active_count() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("in-flight requests did not drain");
}

pub(crate) mod sinks {
    use super::*;
    use conflux_core::{
        ChatSink, ErrorSink, ImageDecodeMode, ImagePayload, ImageSink, JsonSink, StreamSink,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    pub(crate) struct RecordingChatSink {
        responses: Mutex<Vec<String>>,
        partials: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
        full: Mutex<Option<Value>>,
        before_request: AtomicBool,
        after_request: AtomicBool,
        before_response: AtomicBool,
        after_response: AtomicBool,
    }

    impl RecordingChatSink {
        pub fn responses(&self) -> Vec<String> {
            self.responses.lock().unwrap().clone()
        }

        pub fn partials(&self) -> Vec<String> {
            self.partials.lock().unwrap().clone()
        }

        pub fn errors(&self) -> Vec<String> {
            self.errors.lock().unwrap().clone()
        }

        pub fn full_response(&self) -> Option<Value> {
            self.full.lock().unwrap().clone()
        }

        pub fn saw_lifecycle_hooks(&self) -> bool {
            self.before_request.load(Ordering::SeqCst)
                && self.after_request.load(Ordering::SeqCst)
                && self.before_response.load(Ordering::SeqCst)
                && self.after_response.load(Ordering::SeqCst)
        }
    }

    impl ErrorSink for RecordingChatSink {
        fn on_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    impl ChatSink for RecordingChatSink {
        fn before_request(&self) {
            self.before_request.store(true, Ordering::SeqCst);
        }

        fn after_request(&self) {
            self.after_request.store(true, Ordering::SeqCst);
        }

        fn before_response(&self) {
            self.before_response.store(true, Ordering::SeqCst);
        }

        fn after_response(&self) {
            self.after_response.store(true, Ordering::SeqCst);
        }

        fn on_response(&self, text: &str) {
            self.responses.lock().unwrap().push(text.to_string());
        }

        fn on_full_response(&self, json: &Value) {
            *self.full.lock().unwrap() = Some(json.clone());
        }

        fn on_partial(&self, text: &str) {
            self.partials.lock().unwrap().push(text.to_string());
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingImageSink {
        mode: Option<ImageDecodeMode>,
        images: Mutex<Vec<ImagePayload>>,
        errors: Mutex<Vec<String>>,
    }

    impl RecordingImageSink {
        pub fn decoded() -> Self {
            Self {
                mode: Some(ImageDecodeMode::Decoded),
                ..Self::default()
            }
        }

        pub fn images(&self) -> Vec<ImagePayload> {
            self.images.lock().unwrap().clone()
        }
    }

    impl ErrorSink for RecordingImageSink {
        fn on_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    impl ImageSink for RecordingImageSink {
        fn on_success(&self, images: &[ImagePayload], _json: &Value) {
            self.images.lock().unwrap().extend_from_slice(images);
        }

        fn decode_mode(&self) -> ImageDecodeMode {
            self.mode.unwrap_or_default()
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingJsonSink {
        dataset: Mutex<Option<Value>>,
        success: Mutex<Option<Value>>,
        errors: Mutex<Vec<String>>,
    }

    impl RecordingJsonSink {
        pub fn dataset(&self) -> Option<Value> {
            self.dataset.lock().unwrap().clone()
        }

        pub fn success(&self) -> Option<Value> {
            self.success.lock().unwrap().clone()
        }
    }

    impl ErrorSink for RecordingJsonSink {
        fn on_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    impl JsonSink for RecordingJsonSink {
        fn on_success(&self, json: &Value) {
            *self.success.lock().unwrap() = Some(json.clone());
        }

        fn populate_dataset(&self, rows: &Value) -> bool {
            *self.dataset.lock().unwrap() = Some(rows.clone());
            true
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingStreamSink {
        partials: Mutex<Vec<Vec<u8>>>,
        success: Mutex<Option<Vec<u8>>>,
        errors: Mutex<Vec<String>>,
    }

    impl RecordingStreamSink {
        pub fn partials(&self) -> Vec<Vec<u8>> {
            self.partials.lock().unwrap().clone()
        }

        pub fn success(&self) -> Option<Vec<u8>> {
            self.success.lock().unwrap().clone()
        }
    }

    impl ErrorSink for RecordingStreamSink {
        fn on_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    impl StreamSink for RecordingStreamSink {
        fn on_success(&self, bytes: &[u8]) {
            *self.success.lock().unwrap() = Some(bytes.to_vec());
        }

        fn on_partial(&self, bytes: &[u8]) {
            self.partials.lock().unwrap().push(bytes.to_vec());
        }
    }
}
