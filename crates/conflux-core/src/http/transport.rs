//! Transport abstraction over a single HTTP exchange
//!
//! The transport exposes one request/response exchange plus a "bytes
//! received" notification. The dispatcher threads the request's
//! [`CancelToken`] into the exchange so the transfer aborts at the next
//! chunk boundary once the request is cancelled — bounded, not instant: a
//! transfer that never produces chunks will not abort early.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::tracker::CancelToken;

/// Observer invoked for every received body chunk.
pub type ChunkObserver = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// One outbound request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl TransportRequest {
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// One completed exchange: status, headers, and the fully received body.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON, surfacing failure as [`Error::Json`].
    pub fn body_json(&self) -> Result<Value> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Json {
            message: format!("response body is not valid JSON: {}", e),
            source: Some(e),
        })
    }
}

/// A single request/response exchange with an interceptable "bytes
/// received" notification.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn exchange(
        &self,
        request: TransportRequest,
        cancel: CancelToken,
        on_chunk: Option<ChunkObserver>,
    ) -> Result<TransportResponse>;
}

/// reqwest-backed transport. The client is built once; the timeout is
/// transport-level configuration, surfaced as Timeout-classified errors and
/// otherwise unmanaged here.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Transport {
                message: format!("failed to build HTTP client: {}", e),
                source: Some(anyhow::anyhow!(e)),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(
        &self,
        request: TransportRequest,
        cancel: CancelToken,
        on_chunk: Option<ChunkObserver>,
    ) -> Result<TransportResponse> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_send_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            // cooperative abort, observed once per chunk
            if cancel.is_cancelled() {
                return Err(Error::Transport {
                    message: "transfer aborted at chunk boundary after cancellation".to_string(),
                    source: None,
                });
            }
            let chunk = chunk.map_err(map_send_error)?;
            if let Some(observer) = &on_chunk {
                observer(&chunk);
            }
            body.extend_from_slice(&chunk);
        }

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_send_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout {
            message: error.to_string(),
        }
    } else {
        Error::Transport {
            message: error.to_string(),
            source: Some(anyhow::anyhow!(error)),
        }
    }
}

/// Join a provider base URL with an endpoint path.
pub fn join_url(base_url: &str, path: &str) -> Result<String> {
    let base = Url::parse(base_url).map_err(|e| Error::Configuration {
        message: format!("invalid base URL {:?}: {}", base_url, e),
    })?;
    let joined = base.join(path).map_err(|e| Error::Configuration {
        message: format!("invalid endpoint path {:?}: {}", path, e),
    })?;
    Ok(joined.into())
}
