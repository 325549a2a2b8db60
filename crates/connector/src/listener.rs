//! Push event stream over WebSocket.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ConnectorError, Result};
use crate::reconcile::StateReconciler;
use crate::status::{StatusUpdate, UpdateSource, normalize_status};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const STATUS_EVENT: &str = "whatsapp-status";
pub const QR_EVENT: &str = "whatsapp-qr";
pub const ERROR_EVENT: &str = "whatsapp-error";
/// Sent right after connecting so the gateway pushes a state snapshot
/// instead of waiting for its next unsolicited update.
pub const SNAPSHOT_REQUEST_EVENT: &str = "request-qr";

/// Push events delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    Status { status: String, qr: Option<String> },
    Qr { status: String, qr: Option<String> },
    ErrorNotice { message: String },
}

/// Reconnect policy for the push transport.
#[derive(Debug, Clone)]
pub struct ListenerRetry {
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub max_attempts: u32,
}

#[must_use]
pub fn snapshot_request_frame() -> String {
    json!({ "event": SNAPSHOT_REQUEST_EVENT }).to_string()
}

/// Parse one push frame. Unknown event names parse to `None` so new server
/// events do not break older clients.
pub fn parse_push_frame(text: &str) -> Result<Option<PushEvent>> {
    let value: Value = serde_json::from_str(text)?;
    let frame = value
        .as_object()
        .ok_or_else(|| ConnectorError::Protocol("expected JSON object push frame".to_string()))?;
    let event = frame
        .get("event")
        .and_then(Value::as_str)
        .ok_or_else(|| ConnectorError::Protocol("missing push event name".to_string()))?;
    let data = frame.get("data").cloned().unwrap_or(Value::Null);

    match event {
        STATUS_EVENT | QR_EVENT => {
            let status = data
                .get("status")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ConnectorError::Protocol(format!("{event} frame missing status field"))
                })?
                .to_string();
            let qr = data
                .get("qr")
                .and_then(Value::as_str)
                .map(str::to_string);
            if event == QR_EVENT {
                Ok(Some(PushEvent::Qr { status, qr }))
            } else {
                Ok(Some(PushEvent::Status { status, qr }))
            }
        }
        ERROR_EVENT => {
            let message = data
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("WhatsApp gateway reported an error")
                .to_string();
            Ok(Some(PushEvent::ErrorNotice { message }))
        }
        _ => Ok(None),
    }
}

/// Feed one parsed event into the reconciler. Status and QR events go
/// through the same normalization as the poller; error notices only raise
/// a transient error and never change the phase.
pub(crate) fn apply_push_event(
    reconciler: &StateReconciler,
    event: PushEvent,
    observed_at: DateTime<Utc>,
) {
    match event {
        PushEvent::Status { status, qr } | PushEvent::Qr { status, qr } => {
            let phase = normalize_status(&status);
            reconciler.apply(
                StatusUpdate::new(phase, UpdateSource::Push, observed_at).with_qr(qr),
            );
        }
        PushEvent::ErrorNotice { message } => {
            reconciler.report_transient(message);
        }
    }
}

/// Run the push listener until the task is aborted or reconnects are
/// exhausted. Transport loss never clears the connection state; the
/// WhatsApp session may well still be alive server-side, and polling keeps
/// covering while the stream is down.
pub(crate) async fn run_listener(
    socket_url: Url,
    retry: ListenerRetry,
    reconciler: Arc<StateReconciler>,
) {
    let mut failed_attempts: u32 = 0;

    loop {
        match connect(&socket_url, retry.connect_timeout).await {
            Ok(stream) => {
                failed_attempts = 0;
                reconciler.clear_transient();
                let (mut writer, mut reader) = stream.split();

                if let Err(error) = writer
                    .send(Message::Text(snapshot_request_frame().into()))
                    .await
                {
                    warn!(%error, "snapshot request failed");
                }

                while let Some(frame) = reader.next().await {
                    match frame {
                        Ok(Message::Text(text)) => match parse_push_frame(text.as_ref()) {
                            Ok(Some(event)) => apply_push_event(&reconciler, event, Utc::now()),
                            Ok(None) => {}
                            Err(error) => warn!(%error, "push frame parse error"),
                        },
                        Ok(Message::Ping(payload)) => {
                            debug!(bytes = payload.len(), "push transport ping");
                        }
                        Ok(Message::Pong(_) | Message::Binary(_) | Message::Frame(_)) => {}
                        Ok(Message::Close(_)) => break,
                        Err(error) => {
                            warn!(%error, "push transport read error");
                            break;
                        }
                    }
                }
                debug!("push transport closed, reconnecting");
            }
            Err(error) => {
                failed_attempts += 1;
                warn!(attempt = failed_attempts, %error, "push connect failed");
                if failed_attempts >= retry.max_attempts {
                    reconciler.report_transient(
                        "realtime updates unavailable, relying on status polling",
                    );
                    return;
                }
            }
        }

        tokio::time::sleep(retry.reconnect_delay).await;
    }
}

async fn connect(url: &Url, connect_timeout: Duration) -> Result<WsStream> {
    let (stream, _response) = timeout(connect_timeout, connect_async(url.as_str()))
        .await
        .map_err(|_| {
            ConnectorError::Timeout(format!("connect timeout after {connect_timeout:?}"))
        })?
        .map_err(|error| ConnectorError::WebSocket(error.to_string()))?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ConnectionPhase;

    #[test]
    fn parse_named_events() {
        let status = parse_push_frame(
            r#"{"event":"whatsapp-status","data":{"status":"ready"}}"#,
        )
        .expect("parse")
        .expect("event");
        assert_eq!(
            status,
            PushEvent::Status {
                status: "ready".to_string(),
                qr: None
            }
        );

        let qr = parse_push_frame(
            r#"{"event":"whatsapp-qr","data":{"status":"qr","qr":"data:image/png;base64,Zm9v"}}"#,
        )
        .expect("parse")
        .expect("event");
        assert_eq!(
            qr,
            PushEvent::Qr {
                status: "qr".to_string(),
                qr: Some("data:image/png;base64,Zm9v".to_string())
            }
        );

        let notice = parse_push_frame(r#"{"event":"whatsapp-error","data":{"message":"boom"}}"#)
            .expect("parse")
            .expect("event");
        assert_eq!(
            notice,
            PushEvent::ErrorNotice {
                message: "boom".to_string()
            }
        );

        // An error notice without a message still surfaces something.
        let bare = parse_push_frame(r#"{"event":"whatsapp-error"}"#)
            .expect("parse")
            .expect("event");
        assert!(matches!(bare, PushEvent::ErrorNotice { .. }));
    }

    #[test]
    fn unknown_event_names_parse_to_none() {
        let parsed = parse_push_frame(r#"{"event":"whatsapp-battery","data":{"level":40}}"#)
            .expect("parse");
        assert_eq!(parsed, None);
    }

    #[test]
    fn malformed_frames_are_rejected() {
        struct Case {
            name: &'static str,
            input: &'static str,
            expected_error_fragment: &'static str,
        }

        let cases = vec![
            Case {
                name: "non-object frame",
                input: r#"["whatsapp-status"]"#,
                expected_error_fragment: "expected JSON object push frame",
            },
            Case {
                name: "missing event name",
                input: r#"{"data":{"status":"ready"}}"#,
                expected_error_fragment: "missing push event name",
            },
            Case {
                name: "event name is not a string",
                input: r#"{"event":42}"#,
                expected_error_fragment: "missing push event name",
            },
            Case {
                name: "status frame without status",
                input: r#"{"event":"whatsapp-status","data":{"qr":"data:qr"}}"#,
                expected_error_fragment: "whatsapp-status frame missing status field",
            },
            Case {
                name: "qr frame without data",
                input: r#"{"event":"whatsapp-qr"}"#,
                expected_error_fragment: "whatsapp-qr frame missing status field",
            },
        ];

        for case in cases {
            let result = parse_push_frame(case.input);
            let error = match result {
                Err(error) => error.to_string(),
                Ok(parsed) => panic!("{}: expected an error, got {parsed:?}", case.name),
            };
            assert!(
                error.contains(case.expected_error_fragment),
                "{}: expected fragment '{}' in '{}'",
                case.name,
                case.expected_error_fragment,
                error
            );
        }
    }

    #[test]
    fn ready_event_while_awaiting_scan_clears_qr() {
        let reconciler = StateReconciler::new(Utc::now());
        apply_push_event(
            &reconciler,
            PushEvent::Qr {
                status: "qr".to_string(),
                qr: Some("data:qr".to_string()),
            },
            Utc::now(),
        );
        assert_eq!(
            reconciler.current().connection.phase,
            ConnectionPhase::AwaitingScan
        );

        apply_push_event(
            &reconciler,
            PushEvent::Status {
                status: "ready".to_string(),
                qr: None,
            },
            Utc::now(),
        );

        let snapshot = reconciler.current();
        assert_eq!(snapshot.connection.phase, ConnectionPhase::Ready);
        assert_eq!(snapshot.connection.qr_payload, None);
    }

    #[test]
    fn error_notice_keeps_phase_and_raises_transient() {
        let reconciler = StateReconciler::new(Utc::now());
        apply_push_event(
            &reconciler,
            PushEvent::Status {
                status: "ready".to_string(),
                qr: None,
            },
            Utc::now(),
        );
        apply_push_event(
            &reconciler,
            PushEvent::ErrorNotice {
                message: "session glitch".to_string(),
            },
            Utc::now(),
        );

        let snapshot = reconciler.current();
        assert_eq!(snapshot.connection.phase, ConnectionPhase::Ready);
        assert_eq!(snapshot.transient_error.as_deref(), Some("session glitch"));
    }
}
