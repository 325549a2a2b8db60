//! WhatsApp connection status synchronizer.
//!
//! Reconciles two feeds of the gateway's connection status — a polling
//! loop over REST and a WebSocket push stream — into one authoritative
//! [`ConnectionState`] per session, and dispatches the state-changing
//! commands (restart, disconnect, send, validate) with optimistic local
//! updates and per-command in-flight guards.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod listener;
pub mod poller;
pub mod reconcile;
pub mod session;
pub mod status;

pub use config::{ConnectorConfig, WhatsAppEndpoints};
pub use dispatch::{
    ActionDispatcher, CommandResult, CommandTransport, Confirmation, NumberValidation,
    SendMessageResult,
};
pub use error::{ConnectorError, Result};
pub use http::WhatsAppApi;
pub use listener::{ListenerRetry, PushEvent, parse_push_frame};
pub use poller::{StatusPoller, StatusReport, StatusSource};
pub use reconcile::{StateReconciler, StatusSnapshot};
pub use session::ConnectorHandle;
pub use status::{ConnectionPhase, ConnectionState, StatusUpdate, UpdateSource, normalize_status};
