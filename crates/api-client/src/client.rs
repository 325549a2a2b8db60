//! Bearer-token JSON transport.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::auth::TokenStore;
use crate::error::{ApiError, Result, format_http_error};

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REQUEST_ATTEMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub request_attempts: usize,
}

impl ApiClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            request_attempts: DEFAULT_REQUEST_ATTEMPTS,
        }
    }
}

/// JSON transport for the admin backend.
///
/// Every request carries the stored bearer token when one exists. A 401
/// response clears the token store and surfaces [`ApiError::Unauthorized`],
/// the session-wide signal to return to login.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    timeout: Duration,
    request_attempts: usize,
    http: reqwest::Client,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    pub fn new(config: ApiClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            timeout: Duration::from_millis(config.timeout_ms.max(250)),
            request_attempts: config.request_attempts.max(1),
            http: reqwest::Client::new(),
            tokens,
        })
    }

    #[must_use]
    pub fn tokens(&self) -> Arc<dyn TokenStore> {
        Arc::clone(&self.tokens)
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('/') {
            Some(format!("{}{}", self.base_url, trimmed))
        } else {
            Some(format!("{}/{}", self.base_url, trimmed))
        }
    }

    pub async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(Method::GET, path, None::<&()>).await?;
        self.finish(response).await
    }

    pub async fn post_json<Req, Res>(&self, path: &str, payload: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let response = self.send(Method::POST, path, Some(payload)).await?;
        self.finish(response).await
    }

    pub async fn put_json<Req, Res>(&self, path: &str, payload: &Req) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let response = self.send(Method::PUT, path, Some(payload)).await?;
        self.finish(response).await
    }

    /// POST whose response body is ignored; only the status matters.
    pub async fn post_unit<Req>(&self, path: &str, payload: &Req) -> Result<()>
    where
        Req: Serialize + ?Sized,
    {
        let response = self.send(Method::POST, path, Some(payload)).await?;
        self.finish_empty(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let response = self.send(Method::DELETE, path, None::<&()>).await?;
        self.finish_empty(response).await
    }

    async fn send<Req>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Req>,
    ) -> Result<reqwest::Response>
    where
        Req: Serialize + ?Sized,
    {
        let url = self.endpoint(path).ok_or(ApiError::InvalidPath)?;
        let mut last_error: Option<String> = None;

        for attempt in 0..self.request_attempts {
            let mut request = self
                .http
                .request(method.clone(), url.as_str())
                .header("x-request-id", format!("req_{}", Uuid::new_v4().simple()))
                .timeout(self.timeout);
            if let Some(token) = self.tokens.load_token() {
                request = request.bearer_auth(token);
            }
            if let Some(payload) = payload {
                request = request.json(payload);
            }

            match request.send().await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    last_error = Some(error.to_string());
                    if attempt + 1 < self.request_attempts {
                        tracing::debug!(%url, %error, "request attempt failed, retrying");
                    }
                }
            }
        }

        Err(ApiError::Request {
            message: last_error.unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn finish<T>(&self, response: reqwest::Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.clear_token();
            return Err(ApiError::Unauthorized);
        }

        let bytes = response.bytes().await.map_err(|error| ApiError::Read {
            message: error.to_string(),
        })?;
        if !status.is_success() {
            return Err(format_http_error(status, &bytes));
        }

        serde_json::from_slice::<T>(&bytes).map_err(|error| ApiError::Decode {
            message: error.to_string(),
        })
    }

    async fn finish_empty(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.clear_token();
            return Err(ApiError::Unauthorized);
        }
        if status.is_success() {
            return Ok(());
        }

        let bytes = response.bytes().await.map_err(|error| ApiError::Read {
            message: error.to_string(),
        })?;
        Err(format_http_error(status, &bytes))
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ApiError::BaseUrlMissing);
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ApiError::InvalidBaseUrl);
    }
    let Some((_, host)) = trimmed.split_once("://") else {
        return Err(ApiError::InvalidBaseUrl);
    };
    if host.trim().is_empty() || host.starts_with('/') {
        return Err(ApiError::InvalidBaseUrl);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;

    fn client(base_url: &str) -> Result<ApiClient> {
        ApiClient::new(
            ApiClientConfig::new(base_url),
            Arc::new(MemoryTokenStore::new()),
        )
    }

    #[test]
    fn endpoint_builder_normalizes_paths() {
        let client = client("https://api.apto.example/").expect("client");

        assert_eq!(
            client.endpoint("/whatsapp/status"),
            Some("https://api.apto.example/whatsapp/status".to_string())
        );
        assert_eq!(
            client.endpoint("whatsapp/status"),
            Some("https://api.apto.example/whatsapp/status".to_string())
        );
        assert_eq!(client.endpoint("  "), None);
    }

    #[test]
    fn base_url_is_validated() {
        assert!(matches!(client("   "), Err(ApiError::BaseUrlMissing)));
        assert!(matches!(
            client("ftp://api.apto.example"),
            Err(ApiError::InvalidBaseUrl)
        ));
        assert!(matches!(client("https:///admin"), Err(ApiError::InvalidBaseUrl)));
        assert!(client("http://127.0.0.1:4000").is_ok());
    }
}
