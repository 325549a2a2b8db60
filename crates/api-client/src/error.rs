//! API client error types.

use reqwest::StatusCode;
use thiserror::Error;

/// API client error type.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("base url must not be empty")]
    BaseUrlMissing,
    #[error("base url must use http:// or https:// and include a host")]
    InvalidBaseUrl,
    #[error("invalid request path")]
    InvalidPath,
    #[error("request failed: {message}")]
    Request { message: String },
    #[error("response read failed: {message}")]
    Read { message: String },
    #[error("unauthorized")]
    Unauthorized,
    #[error("http {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("json decode failed: {message}")]
    Decode { message: String },
}

impl ApiError {
    /// Human-readable message reported by the backend, when the error body
    /// carries a `message` field.
    #[must_use]
    pub fn backend_message(&self) -> Option<String> {
        let Self::Http { body, .. } = self else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        value
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    }
}

/// API client result type.
pub type Result<T> = std::result::Result<T, ApiError>;

pub(crate) fn format_http_error(status: StatusCode, body: &[u8]) -> ApiError {
    let body = String::from_utf8_lossy(body).trim().to_string();
    let body = if body.is_empty() {
        "<empty>".to_string()
    } else {
        body
    };
    ApiError::Http { status, body }
}
