//! Connector session lifecycle.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use url::Url;

use apto_api_client::TokenStore;

use crate::config::ConnectorConfig;
use crate::dispatch::{ActionDispatcher, CommandTransport};
use crate::error::{ConnectorError, Result};
use crate::http::WhatsAppApi;
use crate::listener::{ListenerRetry, run_listener};
use crate::poller::{StatusPoller, StatusSource, run_poller};
use crate::reconcile::{StateReconciler, StatusSnapshot};

/// One live connector session: the single ConnectionState, the poller and
/// listener tasks feeding it, and the dispatcher for commands.
///
/// Create one handle per session (first mount), and drop it or call
/// [`shutdown`] on teardown or logout. Teardown cancels the polling task
/// (aborting any in-flight fetch), closes the push transport, and retires
/// the reconciler so nothing mutates state afterwards.
///
/// [`shutdown`]: ConnectorHandle::shutdown
pub struct ConnectorHandle {
    reconciler: Arc<StateReconciler>,
    dispatcher: Arc<ActionDispatcher>,
    poller_task: JoinHandle<()>,
    listener_task: JoinHandle<()>,
}

impl ConnectorHandle {
    /// Start a session against the REST backend and push socket named in
    /// the config, sharing the given token store with the rest of the app.
    pub fn start(config: &ConnectorConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let api = Arc::new(WhatsAppApi::new(config, tokens)?);
        Self::start_with(config, api.clone(), api)
    }

    /// Start a session with explicit transports. This is the seam tests
    /// and alternative backends plug into.
    pub fn start_with(
        config: &ConnectorConfig,
        source: Arc<dyn StatusSource>,
        transport: Arc<dyn CommandTransport>,
    ) -> Result<Self> {
        let socket_url = Url::parse(&config.socket_url)
            .map_err(|error| ConnectorError::InvalidSocketUrl(error.to_string()))?;
        if socket_url.scheme() != "ws" && socket_url.scheme() != "wss" {
            return Err(ConnectorError::InvalidSocketUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                socket_url.scheme()
            )));
        }

        let reconciler = Arc::new(StateReconciler::new(Utc::now()));
        let (poke_tx, poke_rx) = mpsc::channel(1);

        let dispatcher = Arc::new(ActionDispatcher::new(
            transport,
            Arc::clone(&reconciler),
            poke_tx,
            config.restart_poll_delay,
        ));

        let poller = StatusPoller::new(
            source,
            Arc::clone(&reconciler),
            config.poll_failure_threshold,
        );
        let poller_task = tokio::spawn(run_poller(poller, config.poll_interval, poke_rx));

        let listener_task = tokio::spawn(run_listener(
            socket_url,
            ListenerRetry {
                connect_timeout: config.connect_timeout,
                reconnect_delay: config.reconnect_delay,
                max_attempts: config.max_reconnect_attempts,
            },
            Arc::clone(&reconciler),
        ));

        Ok(Self {
            reconciler,
            dispatcher,
            poller_task,
            listener_task,
        })
    }

    /// Watch the merged state. The receiver sees every accepted change.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.reconciler.subscribe()
    }

    #[must_use]
    pub fn current(&self) -> StatusSnapshot {
        self.reconciler.current()
    }

    #[must_use]
    pub fn dispatcher(&self) -> Arc<ActionDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Tear the session down. Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        self.reconciler.retire();
        self.poller_task.abort();
        self.listener_task.abort();
    }
}

impl Drop for ConnectorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
