//! Ollama-shaped driver
//!
//! Chat against a local `api/chat` endpoint, no credential required.
//! Responses use the `message.content` envelope.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use conflux_core::{
    ChatRequest, ChatSink, DriverContext, Envelope, Error, ProviderDriver, RequestId, Result,
    TransportRequest,
};

pub struct OllamaDriver {
    context: DriverContext,
}

impl OllamaDriver {
    pub fn new(context: DriverContext) -> Self {
        Self { context }
    }

    fn chat_transport_request(&self, request: &ChatRequest) -> Result<TransportRequest> {
        self.context.require("base_url", &self.context.config.base_url)?;
        self.context.require("model", &self.context.config.model)?;
        if request.messages.is_empty() {
            return Err(Error::Validation {
                field: "messages".to_string(),
                message: "at least one message is required".to_string(),
            });
        }

        let body = json!({
            "model": self.context.config.model,
            "messages": request.messages,
            "stream": request.stream,
        });
        Ok(TransportRequest::post(
            self.context.endpoint("api/chat")?,
            body,
        ))
    }
}

#[async_trait]
impl ProviderDriver for OllamaDriver {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(&self, request: ChatRequest, sink: Arc<dyn ChatSink>) -> Result<RequestId> {
        let transport_request = match self.chat_transport_request(&request) {
            Ok(r) => r,
            Err(e) => return Err(self.context.preflight_fail(&sink, e)),
        };
        Ok(self
            .context
            .run_chat(Envelope::Message, transport_request, request.stream, sink))
    }
}
