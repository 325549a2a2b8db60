//! Connector error types.

use thiserror::Error;

/// Connector error type.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("invalid socket URL: {0}")]
    InvalidSocketUrl(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Api(#[from] apto_api_client::ApiError),
}

/// Connector result type.
pub type Result<T> = std::result::Result<T, ConnectorError>;
