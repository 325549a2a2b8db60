//! REST implementation of the connector's transport seams.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use apto_api_client::{ApiClient, ApiClientConfig, TokenStore};

use crate::config::{ConnectorConfig, WhatsAppEndpoints};
use crate::dispatch::CommandTransport;
use crate::error::Result;
use crate::poller::{StatusReport, StatusSource};

/// `GET <status_path>` response. Older backend revisions name the payload
/// field `qrCode`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, alias = "qrCode")]
    pub qr: Option<String>,
}

/// `GET <qr_path>` response.
#[derive(Debug, Clone, Deserialize)]
pub struct QrResponse {
    pub success: bool,
    #[serde(default, rename = "qrImage")]
    pub qr_image: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    phone: &'a str,
    message: &'a str,
}

/// `POST <send_message_path>` response.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "messageId")]
    pub message_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ValidateNumberPayload<'a> {
    #[serde(rename = "phoneNumber")]
    phone_number: &'a str,
}

/// `POST <validate_path>` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateNumberResponse {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    pub message: String,
    #[serde(default, rename = "formattedNumber")]
    pub formatted_number: Option<String>,
}

/// REST access to the WhatsApp integration endpoints. Serves as both the
/// poller's status source and the dispatcher's command transport.
pub struct WhatsAppApi {
    api: ApiClient,
    endpoints: WhatsAppEndpoints,
}

impl WhatsAppApi {
    pub fn new(config: &ConnectorConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let mut api_config = ApiClientConfig::new(config.api_base_url.clone());
        api_config.timeout_ms = u64::try_from(config.status_timeout.as_millis())
            .unwrap_or(crate::config::DEFAULT_STATUS_TIMEOUT_MS);
        let api = ApiClient::new(api_config, tokens)?;
        Ok(Self {
            api,
            endpoints: config.endpoints.clone(),
        })
    }
}

#[async_trait]
impl StatusSource for WhatsAppApi {
    async fn fetch_status(&self) -> Result<StatusReport> {
        let response: StatusResponse = self.api.get_json(&self.endpoints.status_path).await?;
        Ok(StatusReport {
            status: response.status,
            qr: response.qr,
        })
    }

    async fn fetch_qr(&self) -> Result<Option<String>> {
        let response: QrResponse = self.api.get_json(&self.endpoints.qr_path).await?;
        Ok(if response.success {
            response.qr_image
        } else {
            None
        })
    }
}

#[async_trait]
impl CommandTransport for WhatsAppApi {
    async fn restart(&self) -> Result<()> {
        self.api
            .post_unit(&self.endpoints.restart_path, &json!({}))
            .await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.api
            .post_unit(&self.endpoints.disconnect_path, &json!({}))
            .await?;
        Ok(())
    }

    async fn send_message(&self, phone: &str, message: &str) -> Result<SendMessageResponse> {
        let response = self
            .api
            .post_json(
                &self.endpoints.send_message_path,
                &SendMessagePayload { phone, message },
            )
            .await?;
        Ok(response)
    }

    async fn validate_number(&self, phone: &str) -> Result<ValidateNumberResponse> {
        let response = self
            .api
            .post_json(
                &self.endpoints.validate_path,
                &ValidateNumberPayload {
                    phone_number: phone,
                },
            )
            .await?;
        Ok(response)
    }
}
