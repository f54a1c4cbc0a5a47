//! Callback sinks for the four operation kinds
//!
//! Each operation kind exposes a different subset of hooks. Every hook has
//! a safe no-op default, so an integrator implements only what it cares
//! about; the terminal error hook is shared through [`ErrorSink`] so the
//! dispatcher has one error channel for every sink kind.

use serde_json::Value;

/// The one hook every sink carries: terminal error delivery.
pub trait ErrorSink: Send + Sync {
    fn on_error(&self, _message: &str) {}
}

/// Hooks for chat operations.
pub trait ChatSink: ErrorSink {
    fn before_request(&self) {}
    fn after_request(&self) {}
    fn before_response(&self) {}
    fn after_response(&self) {}
    /// Terminal success: the assistant text.
    fn on_response(&self, _text: &str) {}
    /// Terminal success: the full provider response document.
    fn on_full_response(&self, _json: &Value) {}
    /// Streamed chunk of assistant text, delivered before the terminal
    /// notification.
    fn on_partial(&self, _text: &str) {}
}

/// Whether image payloads are delivered as provider-encoded base64 or
/// decoded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageDecodeMode {
    #[default]
    Base64,
    Decoded,
}

/// One generated image, in the representation the sink asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    Base64(String),
    Bytes(Vec<u8>),
    Url(String),
}

/// Hooks for image generation operations.
pub trait ImageSink: ErrorSink {
    fn on_success(&self, _images: &[ImagePayload], _json: &Value) {}
    /// Consulted by the driver before decoding payloads.
    fn decode_mode(&self) -> ImageDecodeMode {
        ImageDecodeMode::default()
    }
}

/// Hooks for arbitrary structured-JSON operations.
pub trait JsonSink: ErrorSink {
    fn on_success(&self, _json: &Value) {}
    /// Offered the extracted rows; returns whether the sink consumed them.
    /// When it declines, `on_success` is still delivered with the raw
    /// response.
    fn populate_dataset(&self, _rows: &Value) -> bool {
        false
    }
}

/// Hooks for file/stream transform operations.
pub trait StreamSink: ErrorSink {
    /// Terminal success: the fully received payload.
    fn on_success(&self, _bytes: &[u8]) {}
    /// Streamed chunk of raw bytes.
    fn on_partial(&self, _bytes: &[u8]) {}
}
