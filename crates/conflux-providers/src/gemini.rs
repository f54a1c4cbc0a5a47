//! Gemini-shaped driver
//!
//! Chat and structured-JSON execution against the
//! `models/{model}:generateContent` endpoint family. Responses use the
//! `candidates[].content.parts[].text` envelope. Image generation and
//! stream transforms are not offered by this driver.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

use conflux_core::{
    ChatRequest, ChatSink, DriverContext, Envelope, Error, JsonRequest, JsonSink, ProviderDriver,
    RequestId, Result, TransportRequest,
};

pub struct GeminiDriver {
    context: DriverContext,
}

impl GeminiDriver {
    pub fn new(context: DriverContext) -> Self {
        Self { context }
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&self.context.config.api_key).map_err(|_| {
            Error::Configuration {
                message: "api_key contains characters not valid in a header".to_string(),
            }
        })?;
        headers.insert("x-goog-api-key", value);
        Ok(headers)
    }

    fn preflight(&self) -> Result<()> {
        self.context.require("base_url", &self.context.config.base_url)?;
        self.context.require("api_key", &self.context.config.api_key)?;
        Ok(())
    }

    fn chat_transport_request(&self, request: &ChatRequest) -> Result<TransportRequest> {
        self.preflight()?;
        self.context.require("model", &self.context.config.model)?;
        if request.messages.is_empty() {
            return Err(Error::Validation {
                field: "messages".to_string(),
                message: "at least one message is required".to_string(),
            });
        }

        let contents: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                // Gemini only knows "user" and "model" roles
                let role = if m.role == "assistant" { "model" } else { "user" };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        let path = format!("models/{}:generateContent", self.context.config.model);
        let mut transport_request =
            TransportRequest::post(self.context.endpoint(&path)?, json!({"contents": contents}));
        transport_request.headers = self.auth_headers()?;
        Ok(transport_request)
    }
}

#[async_trait]
impl ProviderDriver for GeminiDriver {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, request: ChatRequest, sink: Arc<dyn ChatSink>) -> Result<RequestId> {
        let transport_request = match self.chat_transport_request(&request) {
            Ok(r) => r,
            Err(e) => return Err(self.context.preflight_fail(&sink, e)),
        };
        Ok(self
            .context
            .run_chat(Envelope::Candidates, transport_request, request.stream, sink))
    }

    async fn exec_json(&self, request: JsonRequest, sink: Arc<dyn JsonSink>) -> Result<RequestId> {
        let transport_request = match self.preflight().and_then(|_| {
            let mut r = TransportRequest::post(self.context.endpoint(&request.path)?, request.body);
            r.headers = self.auth_headers()?;
            Ok(r)
        }) {
            Ok(r) => r,
            Err(e) => return Err(self.context.preflight_fail(&sink, e)),
        };
        Ok(self
            .context
            .run_json(Envelope::Candidates, transport_request, sink))
    }
}
