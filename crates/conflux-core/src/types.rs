//! Shared value types for driver operations

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Driver configuration, consumed as opaque values.
///
/// All fields are plain strings as far as this core is concerned; drivers
/// validate what they need before any network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            model: String::new(),
            timeout_secs: 60,
        }
    }
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

/// A chat operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// When set, received chunk text is forwarded to the sink's partial
    /// hook before the terminal notification.
    #[serde(default)]
    pub stream: bool,
}

/// An image generation operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default = "default_image_count")]
    pub count: u32,
    pub size: Option<String>,
}

fn default_image_count() -> u32 {
    1
}

/// An arbitrary structured-JSON operation against a provider endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRequest {
    /// Endpoint path relative to the driver's base URL.
    pub path: String,
    pub body: Value,
}

/// A file/stream transform operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRequest {
    /// Endpoint path relative to the driver's base URL.
    pub path: String,
    pub body: Option<Value>,
}
