//! Polling loop tying the usage client, history store and notifier together.
//!
//! The scheduler owns every piece of mutable pipeline state and runs on a
//! single task. At most one fetch is in flight at a time; timer ticks and
//! manual refreshes that arrive while a fetch is running are dropped.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::core::client::UsageSource;
use crate::core::error::UsageError;
use crate::core::history::HistoryStore;
use crate::core::models::usage::UsageSnapshot;
use crate::core::notifier::{self, Alert, AlertSink, NotifierState};

type FetchFuture = Pin<Box<dyn Future<Output = Result<UsageSnapshot, UsageError>> + Send>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Fetching,
}

/// Presentation-friendly record of the last failed poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub kind: &'static str,
    pub message: String,
}

impl FetchFailure {
    pub fn is_credential_expired(&self) -> bool {
        self.kind == "credential_expired"
    }
}

impl From<&UsageError> for FetchFailure {
    fn from(err: &UsageError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// What the presentation layer sees. The last good snapshot survives failures.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollStatus {
    pub phase: Phase,
    pub snapshot: Option<UsageSnapshot>,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_error: Option<FetchFailure>,
}

pub struct PollingScheduler {
    source: Arc<dyn UsageSource>,
    history: HistoryStore,
    sinks: Vec<Box<dyn AlertSink>>,
    alerts_enabled: bool,
    notifier: NotifierState,
    interval: Duration,
    status: watch::Sender<PollStatus>,
}

impl PollingScheduler {
    pub fn new(source: Arc<dyn UsageSource>, history: HistoryStore, interval: Duration) -> Self {
        let (status, _rx) = watch::channel(PollStatus::default());
        Self {
            source,
            history,
            sinks: Vec::new(),
            alerts_enabled: true,
            notifier: NotifierState::default(),
            interval,
            status,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// When disabled, thresholds are still tracked but nothing is delivered.
    pub fn with_alerts_enabled(mut self, enabled: bool) -> Self {
        self.alerts_enabled = enabled;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<PollStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> PollStatus {
        self.status.borrow().clone()
    }

    pub fn notifier_state(&self) -> &NotifierState {
        &self.notifier
    }

    /// Enter `Fetching` and hand back the fetch, or `None` if one is already running.
    fn begin_fetch(&mut self) -> Option<FetchFuture> {
        if self.status.borrow().phase == Phase::Fetching {
            return None;
        }
        self.status.send_modify(|s| s.phase = Phase::Fetching);
        let source = Arc::clone(&self.source);
        Some(Box::pin(async move { source.fetch().await }))
    }

    fn complete(&mut self, result: Result<UsageSnapshot, UsageError>) -> Result<UsageSnapshot, UsageError> {
        match &result {
            Ok(snapshot) => {
                self.evaluate_alerts(snapshot);
                self.record_history(snapshot);
                let snapshot = snapshot.clone();
                self.status.send_modify(move |s| {
                    s.phase = Phase::Idle;
                    s.snapshot = Some(snapshot);
                    s.last_updated = Some(Utc::now());
                    s.last_error = None;
                });
                debug!("usage poll succeeded");
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "usage poll failed");
                let failure = FetchFailure::from(e);
                self.status.send_modify(move |s| {
                    s.phase = Phase::Idle;
                    s.last_error = Some(failure);
                });
            }
        }
        result
    }

    fn evaluate_alerts(&mut self, snapshot: &UsageSnapshot) {
        for (kind, metric) in snapshot.metrics() {
            let Some(alert) = notifier::evaluate(kind.key(), metric.utilization, &mut self.notifier) else {
                continue;
            };
            if self.alerts_enabled {
                self.dispatch(&alert);
            } else {
                debug!(id = %alert.identifier(), "alerts disabled, not delivering");
            }
        }
    }

    fn dispatch(&self, alert: &Alert) {
        info!(id = %alert.identifier(), percentage = alert.percentage, "usage threshold crossed");
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(alert) {
                warn!(id = %alert.identifier(), error = %e, "alert delivery failed");
            }
        }
    }

    fn record_history(&self, snapshot: &UsageSnapshot) {
        let Some((session, weekly)) = snapshot.history_pair() else {
            debug!("snapshot lacks session or weekly window, history not recorded");
            return;
        };
        if let Err(e) = self.history.record(session, weekly) {
            let reason = format!("{:#}", e);
            warn!(path = %self.history.path().display(), error = %reason, "failed to record usage history");
        }
    }

    /// Run one guarded poll to completion. `None` means a fetch was already running.
    pub async fn poll_once(&mut self) -> Option<Result<UsageSnapshot, UsageError>> {
        let fetch = self.begin_fetch()?;
        let result = fetch.await;
        Some(self.complete(result))
    }

    fn trigger(&mut self, in_flight: &mut Option<FetchFuture>, reason: &'static str) {
        match self.begin_fetch() {
            Some(fetch) => {
                debug!(reason, "starting usage poll");
                *in_flight = Some(fetch);
            }
            None => debug!(reason, "poll already in flight, dropping trigger"),
        }
    }

    /// Poll on the configured interval and on every message from `refresh`,
    /// until `shutdown` resolves. An in-flight fetch is abandoned on shutdown.
    pub async fn run<S>(mut self, mut refresh: mpsc::Receiver<()>, shutdown: S)
    where
        S: Future<Output = ()> + Send,
    {
        let period = self.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<FetchFuture> = None;
        let mut refresh_open = true;
        tokio::pin!(shutdown);

        info!(interval_secs = period.as_secs(), "usage polling started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("usage polling stopped");
                    break;
                }
                result = wait_in_flight(&mut in_flight) => {
                    in_flight = None;
                    let _ = self.complete(result);
                }
                _ = ticker.tick() => self.trigger(&mut in_flight, "timer"),
                msg = refresh.recv(), if refresh_open => match msg {
                    Some(()) => self.trigger(&mut in_flight, "refresh"),
                    None => refresh_open = false,
                },
            }
        }
    }
}

async fn wait_in_flight(in_flight: &mut Option<FetchFuture>) -> Result<UsageSnapshot, UsageError> {
    match in_flight {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}
