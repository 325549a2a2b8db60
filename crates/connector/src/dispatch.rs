//! State-changing commands against the gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tracing::warn;

use apto_api_client::ApiError;

use crate::error::{ConnectorError, Result};
use crate::http::{SendMessageResponse, ValidateNumberResponse};
use crate::reconcile::StateReconciler;
use crate::status::{ConnectionPhase, StatusUpdate, UpdateSource};

/// Where commands are sent. Production uses the REST API; tests inject
/// stubs.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn restart(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn send_message(&self, phone: &str, message: &str) -> Result<SendMessageResponse>;
    async fn validate_number(&self, phone: &str) -> Result<ValidateNumberResponse>;
}

/// Explicit affirmative step required before a destructive command fires.
/// Constructing it is the caller's confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
}

/// Outcome of a restart or disconnect command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
}

impl CommandResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Outcome of one outbound message attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendMessageResult {
    pub success: bool,
    pub message: String,
    pub sent_to: Option<String>,
}

impl SendMessageResult {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            sent_to: None,
        }
    }
}

/// Outcome of a phone number validation. Purely informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumberValidation {
    pub is_valid: bool,
    pub message: String,
    pub formatted_number: Option<String>,
}

impl NumberValidation {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
            formatted_number: None,
        }
    }
}

/// Issues commands and keeps the local state plausible around them.
///
/// Each command holds its own in-flight guard: a second invocation while
/// one is outstanding is rejected locally instead of reaching the backend
/// twice. Every failure comes back as a result object; nothing here
/// propagates into the caller as a panic or an unhandled error.
pub struct ActionDispatcher {
    transport: Arc<dyn CommandTransport>,
    reconciler: Arc<StateReconciler>,
    poke: mpsc::Sender<()>,
    restart_poll_delay: Duration,
    restart_gate: Mutex<()>,
    disconnect_gate: Mutex<()>,
    send_gate: Mutex<()>,
    validate_gate: Mutex<()>,
}

impl ActionDispatcher {
    #[must_use]
    pub(crate) fn new(
        transport: Arc<dyn CommandTransport>,
        reconciler: Arc<StateReconciler>,
        poke: mpsc::Sender<()>,
        restart_poll_delay: Duration,
    ) -> Self {
        Self {
            transport,
            reconciler,
            poke,
            restart_poll_delay,
            restart_gate: Mutex::new(()),
            disconnect_gate: Mutex::new(()),
            send_gate: Mutex::new(()),
            validate_gate: Mutex::new(()),
        }
    }

    /// Restart the gateway session. The state optimistically shows a
    /// connection in progress before the command resolves, and one extra
    /// poll is scheduled to catch backends that are slow to push the new
    /// state.
    pub async fn restart(&self) -> CommandResult {
        let Ok(_guard) = self.restart_gate.try_lock() else {
            return CommandResult::failed("a restart is already in progress");
        };

        self.reconciler.apply(StatusUpdate::new(
            ConnectionPhase::Connecting,
            UpdateSource::Command,
            Utc::now(),
        ));

        match self.transport.restart().await {
            Ok(()) => {
                let poke = self.poke.clone();
                let delay = self.restart_poll_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if poke.send(()).await.is_err() {
                        warn!("poll nudge after restart was dropped, poller already gone");
                    }
                });
                CommandResult::ok("restart requested, waiting for the gateway")
            }
            Err(error) => {
                let message = surface_message(&error, "failed to restart the WhatsApp connection");
                self.reconciler.report_transient(message.clone());
                CommandResult::failed(message)
            }
        }
    }

    /// End the gateway session. Requires an explicit [`Confirmation`];
    /// the caller owns the confirmation UX.
    pub async fn disconnect(&self, _confirmation: Confirmation) -> CommandResult {
        let Ok(_guard) = self.disconnect_gate.try_lock() else {
            return CommandResult::failed("a disconnect is already in progress");
        };

        match self.transport.disconnect().await {
            Ok(()) => {
                self.reconciler.apply(StatusUpdate::new(
                    ConnectionPhase::Disconnected,
                    UpdateSource::Command,
                    Utc::now(),
                ));
                CommandResult::ok("WhatsApp session disconnected")
            }
            Err(error) => {
                let message = surface_message(&error, "failed to disconnect WhatsApp");
                self.reconciler.report_transient(message.clone());
                CommandResult::failed(message)
            }
        }
    }

    /// Send one message. Both fields are checked before any network call,
    /// and the connection state is never touched.
    pub async fn send_message(&self, phone: &str, message: &str) -> SendMessageResult {
        let phone = phone.trim();
        let body = message.trim();
        if phone.is_empty() {
            return SendMessageResult::rejected("phone number is required");
        }
        if body.is_empty() {
            return SendMessageResult::rejected("message is required");
        }
        let Ok(_guard) = self.send_gate.try_lock() else {
            return SendMessageResult::rejected("a message send is already in progress");
        };

        match self.transport.send_message(phone, body).await {
            Ok(response) if response.success => SendMessageResult {
                success: true,
                message: response
                    .message
                    .unwrap_or_else(|| "message sent".to_string()),
                sent_to: Some(phone.to_string()),
            },
            Ok(response) => SendMessageResult::rejected(
                response
                    .message
                    .unwrap_or_else(|| "failed to send message".to_string()),
            ),
            Err(error) => {
                SendMessageResult::rejected(surface_message(&error, "failed to send message"))
            }
        }
    }

    /// Check whether a phone number is reachable over WhatsApp.
    pub async fn validate_number(&self, phone: &str) -> NumberValidation {
        let phone = phone.trim();
        if phone.is_empty() {
            return NumberValidation::rejected("phone number is required");
        }
        let Ok(_guard) = self.validate_gate.try_lock() else {
            return NumberValidation::rejected("a validation is already in progress");
        };

        match self.transport.validate_number(phone).await {
            Ok(response) => NumberValidation {
                is_valid: response.is_valid,
                message: response.message,
                formatted_number: response.formatted_number,
            },
            Err(error) => {
                NumberValidation::rejected(surface_message(&error, "failed to validate number"))
            }
        }
    }
}

/// Turn a command error into the message shown to the operator: the
/// backend's own message when it sent one, a fixed fallback otherwise.
fn surface_message(error: &ConnectorError, fallback: &str) -> String {
    if let ConnectorError::Api(api_error) = error {
        if matches!(api_error, ApiError::Unauthorized) {
            return "session expired, log in again".to_string();
        }
        if let Some(message) = api_error.backend_message() {
            return message;
        }
    }
    fallback.to_string()
}
