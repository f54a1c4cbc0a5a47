//! HTTP error classification
//!
//! Maps raw transport status/body/headers into the provider-agnostic error
//! taxonomy. Every driver funnels failures through [`classify`] so that
//! callers observe one error vocabulary regardless of backend.

use std::fmt;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;

use crate::error::Error;

/// Classification of a failed HTTP exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// HTTP 401/403
    Auth,
    /// HTTP 408/504
    Timeout,
    /// HTTP 429
    RateLimit,
    /// Any other non-2xx status
    Generic,
}

/// Normalized representation of a provider error response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    /// HTTP status code of the failed exchange
    pub http_status: Option<u16>,
    /// Provider-specific error code, when the body carried one
    pub provider_code: Option<String>,
    /// Provider-specific error type, when the body carried one
    pub provider_type: Option<String>,
    /// The request parameter the provider objected to, when named
    pub param: Option<String>,
    /// Retry-After header value in seconds, when present and parseable
    pub retry_after_secs: Option<u64>,
    /// Human-readable error message
    pub message: String,
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Classify a failed HTTP exchange into the provider-agnostic taxonomy.
///
/// The body is parsed best-effort: a conventional nested `error` object
/// (message/code/type/param), then a root-level `message` or `error`
/// string. When neither yields a message, a generic `HTTP <status> error`
/// message is used.
pub fn classify(status: u16, body: &str, headers: &HeaderMap) -> ClassifiedError {
    let retry_after_secs = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok());

    let parsed = serde_json::from_str::<Value>(body).ok();
    let (message, provider_code, provider_type, param) = extract_provider_error(parsed.as_ref());

    ClassifiedError {
        kind: kind_for_status(status),
        http_status: Some(status),
        provider_code,
        provider_type,
        param,
        retry_after_secs,
        message: message.unwrap_or_else(|| format!("HTTP {} error", status)),
    }
}

fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Auth,
        408 | 504 => ErrorKind::Timeout,
        429 => ErrorKind::RateLimit,
        _ => ErrorKind::Generic,
    }
}

/// Extract (message, code, type, param) from a parsed error body.
fn extract_provider_error(
    parsed: Option<&Value>,
) -> (Option<String>, Option<String>, Option<String>, Option<String>) {
    let Some(json) = parsed else {
        return (None, None, None, None);
    };

    // Conventional nested error object: {"error": {"message", "code", "type", "param"}}
    if let Some(error) = json.get("error").filter(|e| e.is_object()) {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(|s| s.to_string());
        let code = field_as_string(error, "code");
        let error_type = error
            .get("type")
            .and_then(|t| t.as_str())
            .map(|s| s.to_string());
        let param = error
            .get("param")
            .and_then(|p| p.as_str())
            .map(|s| s.to_string());
        return (message, code, error_type, param);
    }

    // Root-level message string
    if let Some(message) = json.get("message").and_then(|m| m.as_str()) {
        let error_type = json
            .get("type")
            .and_then(|t| t.as_str())
            .map(|s| s.to_string());
        return (Some(message.to_string()), None, error_type, None);
    }

    // Root-level error string: {"error": "..."}
    if let Some(message) = json.get("error").and_then(|e| e.as_str()) {
        return (Some(message.to_string()), None, None, None);
    }

    (None, None, None, None)
}

/// Provider codes show up both as strings and as bare numbers.
fn field_as_string(value: &Value, key: &str) -> Option<String> {
    match value.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

impl From<ClassifiedError> for Error {
    fn from(classified: ClassifiedError) -> Self {
        match classified.kind {
            ErrorKind::Auth => Error::Auth(classified),
            ErrorKind::RateLimit => Error::RateLimit(classified),
            // Timeouts drop the HTTP context, the message is all that survives
            ErrorKind::Timeout => Error::Timeout {
                message: classified.message,
            },
            ErrorKind::Generic => Error::Http(classified),
        }
    }
}
