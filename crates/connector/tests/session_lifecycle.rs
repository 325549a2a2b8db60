//! Session lifecycle: startup, live updates, and teardown behavior.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use apto_connector::http::{SendMessageResponse, ValidateNumberResponse};
use apto_connector::{
    CommandTransport, ConnectionPhase, ConnectorConfig, ConnectorHandle, Result, StatusReport,
    StatusSource,
};

/// Status source whose reported phase can be changed from the test.
struct SwitchableSource {
    status: Mutex<String>,
}

impl SwitchableSource {
    fn new(status: &str) -> Self {
        Self {
            status: Mutex::new(status.to_string()),
        }
    }

    fn set_status(&self, status: &str) {
        *self
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = status.to_string();
    }
}

#[async_trait]
impl StatusSource for SwitchableSource {
    async fn fetch_status(&self) -> Result<StatusReport> {
        Ok(StatusReport {
            status: self
                .status
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            qr: None,
        })
    }

    async fn fetch_qr(&self) -> Result<Option<String>> {
        Ok(Some("data:qr".to_string()))
    }
}

struct NoopTransport;

#[async_trait]
impl CommandTransport for NoopTransport {
    async fn restart(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn send_message(&self, _phone: &str, _message: &str) -> Result<SendMessageResponse> {
        Ok(SendMessageResponse {
            success: true,
            message: None,
            message_id: None,
        })
    }

    async fn validate_number(&self, _phone: &str) -> Result<ValidateNumberResponse> {
        Ok(ValidateNumberResponse {
            is_valid: true,
            message: "number is registered".to_string(),
            formatted_number: None,
        })
    }
}

fn fast_config() -> ConnectorConfig {
    // Nothing listens on these addresses; the listener degrades to
    // polling after one failed attempt.
    let mut config = ConnectorConfig::new("http://127.0.0.1:9", "ws://127.0.0.1:9");
    config.poll_interval = Duration::from_millis(20);
    config.connect_timeout = Duration::from_millis(200);
    config.reconnect_delay = Duration::from_millis(10);
    config.max_reconnect_attempts = 1;
    config.restart_poll_delay = Duration::from_millis(1);
    config
}

async fn wait_for_phase(handle: &ConnectorHandle, phase: ConnectionPhase) {
    let mut updates = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if updates.borrow().connection.phase == phase {
                return;
            }
            updates.changed().await.expect("reconciler alive");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {phase:?}"));
}

#[tokio::test]
async fn polling_drives_state_while_push_is_unavailable() {
    let source = Arc::new(SwitchableSource::new("ready"));
    let handle = ConnectorHandle::start_with(&fast_config(), source.clone(), Arc::new(NoopTransport))
        .expect("start connector");

    wait_for_phase(&handle, ConnectionPhase::Ready).await;

    source.set_status("logged_out");
    wait_for_phase(&handle, ConnectionPhase::Disconnected).await;

    handle.shutdown();
}

#[tokio::test]
async fn teardown_stops_all_state_mutation() {
    let source = Arc::new(SwitchableSource::new("ready"));
    let handle = ConnectorHandle::start_with(&fast_config(), source.clone(), Arc::new(NoopTransport))
        .expect("start connector");

    wait_for_phase(&handle, ConnectionPhase::Ready).await;
    let dispatcher = handle.dispatcher();
    handle.shutdown();
    let frozen = handle.current();

    // New poll results must not land after teardown.
    source.set_status("qr");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.current(), frozen);

    // A command issued around teardown completes without touching state.
    let result = dispatcher.restart().await;
    assert!(result.success);
    assert_eq!(handle.current(), frozen);
}

#[tokio::test]
async fn dropping_the_handle_tears_the_session_down() {
    let source = Arc::new(SwitchableSource::new("ready"));
    let handle = ConnectorHandle::start_with(&fast_config(), source.clone(), Arc::new(NoopTransport))
        .expect("start connector");

    wait_for_phase(&handle, ConnectionPhase::Ready).await;
    let mut updates = handle.subscribe();
    drop(handle);

    // The watch channel closes once the session (its sole sender) is gone.
    tokio::time::timeout(Duration::from_secs(5), async {
        while updates.changed().await.is_ok() {}
    })
    .await
    .expect("channel should close after drop");
}
