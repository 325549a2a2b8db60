//! Connection status vocabulary.
//!
//! The gateway backends are inconsistent about status strings
//! ("authenticated", "logged_out", "auth_failure", ...), so every inbound
//! status goes through the single [`normalize_status`] mapping below. The
//! poller and the push listener share it; keeping one table is what keeps
//! the two channels from drifting apart in how they read the same string.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// Closed set of connection phases exposed to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Idle,
    Connecting,
    AwaitingScan,
    Ready,
    Disconnected,
    Error,
}

impl ConnectionPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::AwaitingScan => "awaiting_scan",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

/// Which channel produced an update. Diagnostics only; correctness never
/// depends on it apart from the terminal-push override in the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    Poll,
    Push,
    Command,
}

impl UpdateSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Poll => "poll",
            Self::Push => "push",
            Self::Command => "command",
        }
    }
}

/// Map a vendor status string onto the closed phase set.
///
/// Total: every input maps to exactly one phase. Unknown strings are
/// logged and treated as disconnected rather than dropped.
#[must_use]
pub fn normalize_status(raw: &str) -> ConnectionPhase {
    match raw.trim().to_ascii_lowercase().as_str() {
        "idle" => ConnectionPhase::Idle,
        "connecting" | "initializing" => ConnectionPhase::Connecting,
        // A restart produces a fresh QR shortly; report it as the scan
        // phase so the payload is shown as soon as it exists.
        "qr" | "restarting" => ConnectionPhase::AwaitingScan,
        "ready" | "authenticated" => ConnectionPhase::Ready,
        "disconnected" | "logged_out" | "auth_failure" | "failed" => ConnectionPhase::Disconnected,
        "error" => ConnectionPhase::Error,
        other => {
            warn!(status = other, "unknown gateway status, treating as disconnected");
            ConnectionPhase::Disconnected
        }
    }
}

/// The single authoritative connection state for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionState {
    pub phase: ConnectionPhase,
    /// Scannable QR payload; present exactly while `phase` is
    /// [`ConnectionPhase::AwaitingScan`].
    pub qr_payload: Option<String>,
    pub last_updated: DateTime<Utc>,
    /// Channel behind the last accepted update; `None` until the first one.
    pub source: Option<UpdateSource>,
    /// Present exactly while `phase` is [`ConnectionPhase::Error`].
    pub error_detail: Option<String>,
}

impl ConnectionState {
    #[must_use]
    pub fn idle(created_at: DateTime<Utc>) -> Self {
        Self {
            phase: ConnectionPhase::Idle,
            qr_payload: None,
            last_updated: created_at,
            source: None,
            error_detail: None,
        }
    }

    #[must_use]
    pub fn holds_invariants(&self) -> bool {
        (self.qr_payload.is_some() == (self.phase == ConnectionPhase::AwaitingScan))
            && (self.error_detail.is_none() || self.phase == ConnectionPhase::Error)
    }
}

/// A partial update proposed by one of the feeders.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub phase: ConnectionPhase,
    pub qr_payload: Option<String>,
    pub error_detail: Option<String>,
    pub source: UpdateSource,
    pub observed_at: DateTime<Utc>,
}

impl StatusUpdate {
    #[must_use]
    pub fn new(phase: ConnectionPhase, source: UpdateSource, observed_at: DateTime<Utc>) -> Self {
        Self {
            phase,
            qr_payload: None,
            error_detail: None,
            source,
            observed_at,
        }
    }

    #[must_use]
    pub fn with_qr(mut self, qr_payload: Option<String>) -> Self {
        self.qr_payload = qr_payload;
        self
    }

    #[must_use]
    pub fn with_error_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    /// Enforce the field constraints before the update reaches the state:
    /// a scan phase without a payload is only a connection in progress, a
    /// payload is meaningless outside the scan phase, and error detail is
    /// meaningless outside the error phase.
    #[must_use]
    pub(crate) fn coerced(mut self) -> Self {
        if self.phase == ConnectionPhase::AwaitingScan {
            let blank = self
                .qr_payload
                .as_deref()
                .is_none_or(|qr| qr.trim().is_empty());
            if blank {
                self.phase = ConnectionPhase::Connecting;
                self.qr_payload = None;
            }
        } else {
            self.qr_payload = None;
        }
        if self.phase != ConnectionPhase::Error {
            self.error_detail = None;
        }
        self
    }
}
