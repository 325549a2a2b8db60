//! Pull-based status polling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::Result;
use crate::reconcile::StateReconciler;
use crate::status::{ConnectionPhase, StatusUpdate, UpdateSource, normalize_status};

/// A raw status report as the backend returns it.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: String,
    pub qr: Option<String>,
}

/// Where the poller reads status from. Production uses the REST API; tests
/// inject stubs.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self) -> Result<StatusReport>;

    /// Follow-up fetch for a QR payload when a status report says the
    /// session is waiting for a scan but carries no payload inline.
    async fn fetch_qr(&self) -> Result<Option<String>>;
}

/// Polls the status endpoint and feeds the reconciler.
///
/// A tick fetches at most once and awaits the fetch inline, so requests
/// never overlap; the driving loop skips missed ticks instead of bursting.
/// Failures below the threshold only raise a transient error and leave the
/// last good phase alone; past the threshold the phase degrades to the
/// error phase until a fetch succeeds again.
pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    reconciler: Arc<StateReconciler>,
    failure_threshold: u32,
    consecutive_failures: u32,
}

impl StatusPoller {
    #[must_use]
    pub fn new(
        source: Arc<dyn StatusSource>,
        reconciler: Arc<StateReconciler>,
        failure_threshold: u32,
    ) -> Self {
        Self {
            source,
            reconciler,
            failure_threshold,
            consecutive_failures: 0,
        }
    }

    pub async fn tick(&mut self) {
        match self.source.fetch_status().await {
            Ok(report) => {
                self.consecutive_failures = 0;
                let phase = normalize_status(&report.status);
                let mut qr = report.qr;

                if phase == ConnectionPhase::AwaitingScan && is_blank(qr.as_deref()) {
                    qr = match self.source.fetch_qr().await {
                        Ok(payload) => payload,
                        Err(error) => {
                            debug!(%error, "follow-up qr fetch failed");
                            None
                        }
                    };
                }

                self.reconciler.apply(
                    StatusUpdate::new(phase, UpdateSource::Poll, Utc::now()).with_qr(qr),
                );
            }
            Err(error) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                warn!(
                    failures = self.consecutive_failures,
                    %error,
                    "status poll failed"
                );
                if self.consecutive_failures > self.failure_threshold {
                    self.reconciler.apply(
                        StatusUpdate::new(ConnectionPhase::Error, UpdateSource::Poll, Utc::now())
                            .with_error_detail(format!(
                                "status polling failed {} times in a row: {error}",
                                self.consecutive_failures
                            )),
                    );
                } else {
                    self.reconciler
                        .report_transient(format!("failed to load connection status: {error}"));
                }
            }
        }
    }
}

/// Drive the poller until the task is aborted. `poke` requests an
/// immediate extra tick between interval ticks.
pub(crate) async fn run_poller(
    mut poller: StatusPoller,
    interval: Duration,
    mut poke: mpsc::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut poke_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            poked = poke.recv(), if poke_open => {
                if poked.is_none() {
                    poke_open = false;
                    continue;
                }
            }
        }
        poller.tick().await;
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|text| text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ConnectorError;

    struct ScriptedSource {
        reports: Mutex<VecDeque<Result<StatusReport>>>,
        qr_payload: Option<String>,
        qr_fetches: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(reports: Vec<Result<StatusReport>>) -> Self {
            Self {
                reports: Mutex::new(reports.into_iter().collect()),
                qr_payload: None,
                qr_fetches: AtomicUsize::new(0),
            }
        }

        fn with_qr(mut self, qr: &str) -> Self {
            self.qr_payload = Some(qr.to_string());
            self
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn fetch_status(&self) -> Result<StatusReport> {
            self.reports
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| {
                    Err(ConnectorError::Timeout("script exhausted".to_string()))
                })
        }

        async fn fetch_qr(&self) -> Result<Option<String>> {
            self.qr_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.qr_payload.clone())
        }
    }

    fn report(status: &str, qr: Option<&str>) -> Result<StatusReport> {
        Ok(StatusReport {
            status: status.to_string(),
            qr: qr.map(str::to_string),
        })
    }

    fn failure() -> Result<StatusReport> {
        Err(ConnectorError::Timeout("connect timed out".to_string()))
    }

    fn poller_with(
        source: ScriptedSource,
    ) -> (StatusPoller, Arc<StateReconciler>, Arc<ScriptedSource>) {
        let source = Arc::new(source);
        let reconciler = Arc::new(StateReconciler::new(Utc::now()));
        let poller = StatusPoller::new(source.clone(), Arc::clone(&reconciler), 3);
        (poller, reconciler, source)
    }

    #[tokio::test]
    async fn qr_report_enters_scan_phase_with_payload() {
        let (mut poller, reconciler, _source) =
            poller_with(ScriptedSource::new(vec![report("qr", Some("data:qr"))]));
        poller.tick().await;

        let snapshot = reconciler.current();
        assert_eq!(snapshot.connection.phase, ConnectionPhase::AwaitingScan);
        assert_eq!(snapshot.connection.qr_payload.as_deref(), Some("data:qr"));
    }

    #[tokio::test]
    async fn missing_inline_qr_triggers_one_follow_up_fetch() {
        let (mut poller, reconciler, source) = poller_with(
            ScriptedSource::new(vec![report("qr", None)]).with_qr("data:fetched"),
        );
        poller.tick().await;

        let snapshot = reconciler.current();
        assert_eq!(snapshot.connection.phase, ConnectionPhase::AwaitingScan);
        assert_eq!(
            snapshot.connection.qr_payload.as_deref(),
            Some("data:fetched")
        );
        // One fetch, not a retry loop.
        assert_eq!(source.qr_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_below_threshold_keep_last_good_phase() {
        let (mut poller, reconciler, _source) = poller_with(ScriptedSource::new(vec![
            report("ready", None),
            failure(),
            failure(),
            failure(),
        ]));
        for _ in 0..4 {
            poller.tick().await;
        }

        let snapshot = reconciler.current();
        assert_eq!(snapshot.connection.phase, ConnectionPhase::Ready);
        assert!(snapshot.transient_error.is_some());
    }

    #[tokio::test]
    async fn repeated_failures_degrade_to_error_and_success_recovers() {
        let (mut poller, reconciler, _source) = poller_with(ScriptedSource::new(vec![
            failure(),
            failure(),
            failure(),
            failure(),
            failure(),
            report("ready", None),
        ]));

        for _ in 0..5 {
            poller.tick().await;
        }
        let degraded = reconciler.current();
        assert_eq!(degraded.connection.phase, ConnectionPhase::Error);
        assert!(degraded.connection.error_detail.is_some());

        poller.tick().await;
        let recovered = reconciler.current();
        assert_eq!(recovered.connection.phase, ConnectionPhase::Ready);
        assert_eq!(recovered.connection.error_detail, None);
        assert_eq!(recovered.transient_error, None);
    }
}
