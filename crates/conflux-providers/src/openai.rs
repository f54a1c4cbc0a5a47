//! OpenAI-shaped driver
//!
//! Covers the full capability set: chat completions, image generation,
//! arbitrary structured-JSON execution, and file/stream transforms.
//! Responses use the `choices[].message.content` envelope.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use conflux_core::{
    ChatRequest, ChatSink, DriverContext, Envelope, Error, ImageDecodeMode, ImagePayload,
    ImageRequest, ImageSink, JsonRequest, JsonSink, ProviderDriver, RequestId, Result,
    StreamRequest, StreamSink, TransportRequest,
};

pub struct OpenAiDriver {
    context: DriverContext,
}

impl OpenAiDriver {
    pub fn new(context: DriverContext) -> Self {
        Self { context }
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", self.context.config.api_key);
        let value = HeaderValue::from_str(&bearer).map_err(|_| Error::Configuration {
            message: "api_key contains characters not valid in a header".to_string(),
        })?;
        headers.insert(AUTHORIZATION, value);
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

        let mut body = json!({
            "model": self.context.config.model,
            "messages": request.messages,
        });
        if request.stream {
            body["stream"] = Value::Bool(true);
        }

        let mut transport_request =
            TransportRequest::post(self.context.endpoint("chat/completions")?, body);
        transport_request.headers = self.auth_headers()?;
        Ok(transport_request)
    }

    fn image_transport_request(&self, request: &ImageRequest) -> Result<TransportRequest> {
        self.preflight()?;
        self.context.require("model", &self.context.config.model)?;
        if request.prompt.trim().is_empty() {
            return Err(Error::Validation {
                field: "prompt".to_string(),
                message: "prompt must not be empty".to_string(),
            });
        }

        let mut body = json!({
            "model": self.context.config.model,
            "prompt": request.prompt,
            "n": request.count,
            "response_format": "b64_json",
        });
        if let Some(size) = &request.size {
            body["size"] = Value::String(size.clone());
        }

        let mut transport_request =
            TransportRequest::post(self.context.endpoint("images/generations")?, body);
        transport_request.headers = self.auth_headers()?;
        Ok(transport_request)
    }
}

#[async_trait]
impl ProviderDriver for OpenAiDriver {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest, sink: Arc<dyn ChatSink>) -> Result<RequestId> {
        let transport_request = match self.chat_transport_request(&request) {
            Ok(r) => r,
            Err(e) => return Err(self.context.preflight_fail(&sink, e)),
        };
        Ok(self
            .context
            .run_chat(Envelope::Choices, transport_request, request.stream, sink))
    }

    async fn image(&self, request: ImageRequest, sink: Arc<dyn ImageSink>) -> Result<RequestId> {
        let transport_request = match self.image_transport_request(&request) {
            Ok(r) => r,
            Err(e) => return Err(self.context.preflight_fail(&sink, e)),
        };
        Ok(self.context.run_value(
            transport_request,
            None,
            |sink, result| match result {
                Ok(json) => match collect_images(&json, sink.decode_mode()) {
                    Ok(images) => sink.on_success(&images, &json),
                    Err(e) => sink.on_error(&e.to_string()),
                },
                Err(e) => sink.on_error(&e.to_string()),
            },
            sink,
        ))
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
            .run_json(Envelope::Choices, transport_request, sink))
    }

    async fn transform_stream(
        &self,
        request: StreamRequest,
        sink: Arc<dyn StreamSink>,
    ) -> Result<RequestId> {
        let transport_request = match self.preflight().and_then(|_| {
            let url = self.context.endpoint(&request.path)?;
            let mut r = match request.body {
                Some(body) => TransportRequest::post(url, body),
                None => TransportRequest::get(url),
            };
            r.headers = self.auth_headers()?;
            Ok(r)
        }) {
            Ok(r) => r,
            Err(e) => return Err(self.context.preflight_fail(&sink, e)),
        };
        Ok(self.context.run_stream(transport_request, sink))
    }
}

/// Pull image payloads out of the `data[]` array, decoding per the sink's
/// requested mode.
fn collect_images(json: &Value, mode: ImageDecodeMode) -> Result<Vec<ImagePayload>> {
    let mut images = Vec::new();
    let entries = json.get("data").and_then(Value::as_array);
    for entry in entries.into_iter().flatten() {
        if let Some(b64) = entry.get("b64_json").and_then(Value::as_str) {
            images.push(match mode {
                ImageDecodeMode::Base64 => ImagePayload::Base64(b64.to_string()),
                ImageDecodeMode::Decoded => {
                    ImagePayload::Bytes(BASE64.decode(b64).map_err(|e| Error::Json {
                        message: format!("image payload is not valid base64: {}", e),
                        source: None,
                    })?)
                }
            });
        } else if let Some(url) = entry.get("url").and_then(Value::as_str) {
            images.push(ImagePayload::Url(url.to_string()));
        }
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{drain, scripted_context, sinks::*, test_config, ScriptedTransport};
    use conflux_core::ChatMessage;

    fn chat_request() -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::user("list the planets")],
            stream: false,
        }
    }

    #[tokio::test]
    async fn test_chat_delivers_envelope_text() {
        let response = json!({
            "choices": [{"message": {"role": "assistant", "content": "eight planets"}}]
        });
        let (context, transport) = scripted_context(ScriptedTransport::json(200, &response));
        let driver = OpenAiDriver::new(context.clone());
        let sink = Arc::new(RecordingChatSink::default());

        driver.chat(chat_request(), sink.clone()).await.unwrap();
        drain(context.dispatcher.tracker()).await;

        assert_eq!(sink.responses(), vec!["eight planets".to_string()]);
        assert_eq!(sink.errors().len(), 0);
        assert_eq!(sink.full_response(), Some(response));
        assert!(sink.saw_lifecycle_hooks());

        let seen = transport.requests();
        assert_eq!(seen[0].url, "https://api.test.local/v1/chat/completions");
        assert_eq!(seen[0].body.as_ref().unwrap()["model"], "test-model");
    }

    #[tokio::test]
    async fn test_chat_http_error_is_classified() {
        let body = json!({"error": {"message": "slow down", "code": "rate_limited"}});
        let (context, _transport) = scripted_context(ScriptedTransport::json(429, &body));
        let driver = OpenAiDriver::new(context.clone());
        let sink = Arc::new(RecordingChatSink::default());

        driver.chat(chat_request(), sink.clone()).await.unwrap();
        drain(context.dispatcher.tracker()).await;

        assert_eq!(sink.responses().len(), 0);
        let errors = sink.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("slow down"), "got {:?}", errors[0]);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_preflight_config_error() {
        let mut config = test_config();
        config.api_key.clear();
        let (context, transport) =
            crate::testing::scripted_context_with(config, ScriptedTransport::json(200, &json!({})));
        let driver = OpenAiDriver::new(context);
        let sink = Arc::new(RecordingChatSink::default());

        let err = driver.chat(chat_request(), sink.clone()).await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        // delivered through the same error channel, before any network call
        assert_eq!(sink.errors().len(), 1);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_empty_messages_is_validation_error() {
        let (context, _transport) = scripted_context(ScriptedTransport::json(200, &json!({})));
        let driver = OpenAiDriver::new(context);
        let sink = Arc::new(RecordingChatSink::default());

        let err = driver
            .chat(ChatRequest::default(), sink.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(sink.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_image_decodes_when_asked() {
        let png_bytes = b"not-really-a-png";
        let response = json!({"data": [{"b64_json": BASE64.encode(png_bytes)}]});
        let (context, _transport) = scripted_context(ScriptedTransport::json(200, &response));
        let driver = OpenAiDriver::new(context.clone());
        let sink = Arc::new(RecordingImageSink::decoded());

        driver
            .image(
                ImageRequest {
                    prompt: "a teapot".to_string(),
                    count: 1,
                    size: Some("512x512".to_string()),
                },
                sink.clone(),
            )
            .await
            .unwrap();
        drain(context.dispatcher.tracker()).await;

        assert_eq!(
            sink.images(),
            vec![ImagePayload::Bytes(png_bytes.to_vec())]
        );
    }

    #[tokio::test]
    async fn test_exec_json_offers_rows_to_dataset() {
        let response = json!({
            "choices": [{"message": {"content": "```json\n[{\"a\":1},{\"a\":2}]\n```"}}]
        });
        let (context, _transport) = scripted_context(ScriptedTransport::json(200, &response));
        let driver = OpenAiDriver::new(context.clone());
        let sink = Arc::new(RecordingJsonSink::default());

        driver
            .exec_json(
                JsonRequest {
                    path: "chat/completions".to_string(),
                    body: json!({"model": "test-model"}),
                },
                sink.clone(),
            )
            .await
            .unwrap();
        drain(context.dispatcher.tracker()).await;

        assert_eq!(
            sink.dataset(),
            Some(json!([{"a": 1}, {"a": 2}]))
        );
        assert!(sink.success().is_some());
    }

    #[tokio::test]
    async fn test_transform_stream_forwards_chunks() {
        let (context, _transport) =
            scripted_context(ScriptedTransport::bytes(200, b"chunked payload".to_vec()));
        let driver = OpenAiDriver::new(context.clone());
        let sink = Arc::new(RecordingStreamSink::default());

        driver
            .transform_stream(
                StreamRequest {
                    path: "files/content".to_string(),
                    body: None,
                },
                sink.clone(),
            )
            .await
            .unwrap();
        drain(context.dispatcher.tracker()).await;

        assert_eq!(sink.partials(), vec![b"chunked payload".to_vec()]);
        assert_eq!(sink.success(), Some(b"chunked payload".to_vec()));
    }

    #[tokio::test]
    async fn test_cancelled_chat_delivers_nothing() {
        let response = json!({"choices": [{"message": {"content": "late"}}]});
        let (context, _transport) =
            scripted_context(ScriptedTransport::json(200, &response).with_delay_ms(40));
        let driver = OpenAiDriver::new(context.clone());
        let sink = Arc::new(RecordingChatSink::default());

        let id = driver.chat(chat_request(), sink.clone()).await.unwrap();
        context.dispatcher.tracker().cancel(id);
        drain(context.dispatcher.tracker()).await;

        assert_eq!(sink.responses().len(), 0);
        assert_eq!(sink.errors().len(), 0);
    }
}
