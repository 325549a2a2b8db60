//! Merging poll and push updates into one authoritative state.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::status::{ConnectionPhase, ConnectionState, StatusUpdate, UpdateSource};

/// The view published to subscribers after every accepted change.
///
/// `transient_error` carries degradation that does not change the phase:
/// poll failures below the threshold, reconnect exhaustion, pushed error
/// notices. It sits next to the state rather than inside it so
/// `error_detail` stays tied to the error phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub connection: ConnectionState,
    pub transient_error: Option<String>,
}

/// Sole mutation point for the session's [`ConnectionState`].
///
/// Updates are last-write-wins on their `observed_at` timestamp, with one
/// override: a push carrying `Ready` or `Disconnected` is applied in full
/// regardless of ordering, so a terminal phase can never be shadowed by a
/// late-arriving QR. Each accepted update is applied atomically before
/// subscribers are notified, and none is applied after [`retire`].
///
/// [`retire`]: StateReconciler::retire
pub struct StateReconciler {
    tx: watch::Sender<StatusSnapshot>,
    live: AtomicBool,
}

impl StateReconciler {
    #[must_use]
    pub fn new(created_at: DateTime<Utc>) -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot {
            connection: ConnectionState::idle(created_at),
            transient_error: None,
        });
        Self {
            tx,
            live: AtomicBool::new(true),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn current(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    /// Apply a proposed update. Returns whether it was accepted.
    pub fn apply(&self, update: StatusUpdate) -> bool {
        if !self.live.load(Ordering::SeqCst) {
            return false;
        }
        let update = update.coerced();

        let accepted = self.tx.send_if_modified(|snapshot| {
            let current = &mut snapshot.connection;
            let terminal_push = update.source == UpdateSource::Push
                && matches!(
                    update.phase,
                    ConnectionPhase::Ready | ConnectionPhase::Disconnected
                );
            if update.observed_at < current.last_updated && !terminal_push {
                return false;
            }

            current.phase = update.phase;
            current.qr_payload = update.qr_payload;
            current.error_detail = update.error_detail;
            current.last_updated = current.last_updated.max(update.observed_at);
            current.source = Some(update.source);
            snapshot.transient_error = None;
            true
        });

        debug_assert!(self.tx.borrow().connection.holds_invariants());
        accepted
    }

    /// Surface a transport-level problem without touching the phase.
    pub fn report_transient(&self, message: impl Into<String>) -> bool {
        if !self.live.load(Ordering::SeqCst) {
            return false;
        }
        let message = message.into();
        self.tx.send_if_modified(|snapshot| {
            if snapshot.transient_error.as_deref() == Some(message.as_str()) {
                return false;
            }
            snapshot.transient_error = Some(message);
            true
        })
    }

    pub fn clear_transient(&self) -> bool {
        if !self.live.load(Ordering::SeqCst) {
            return false;
        }
        self.tx.send_if_modified(|snapshot| {
            if snapshot.transient_error.is_none() {
                return false;
            }
            snapshot.transient_error = None;
            true
        })
    }

    /// Make the reconciler inert. Called on teardown so an in-flight fetch
    /// or command that completes afterwards cannot mutate state.
    pub fn retire(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}
