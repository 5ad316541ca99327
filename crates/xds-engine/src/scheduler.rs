//! Periodic source refresh.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use xds_core::{XdsError, XdsResult};
use xds_sources::{RefreshOutcome, SnapshotProvider};

/// Drives source refreshes: once at startup, then on a fixed interval and
/// on demand.
///
/// Refreshes never overlap. A trigger that fires while a refresh is in
/// flight is skipped. A failed refresh keeps the last good snapshot and the
/// schedule keeps running.
#[derive(Debug)]
pub struct RefreshScheduler {
    provider: Arc<dyn SnapshotProvider>,
    interval: Duration,
    last_attempt: Mutex<Option<Instant>>,
    shutdown: watch::Sender<bool>,
}

impl RefreshScheduler {
    /// Create a scheduler refreshing `provider` every `interval`.
    pub fn new(provider: Arc<dyn SnapshotProvider>, interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            provider,
            interval,
            last_attempt: Mutex::new(None),
            shutdown,
        }
    }

    /// Refresh interval.
    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Populate the first snapshot before serving.
    ///
    /// # Errors
    ///
    /// Returns the refresh error if the initial load fails; the process
    /// cannot serve without data.
    pub async fn warm_start(&self) -> XdsResult<()> {
        self.mark_attempt();
        match self.provider.refresh_now().await {
            RefreshOutcome::Refreshed {
                generation,
                instances,
            } => {
                info!(generation, instances, "initial source load complete");
                Ok(())
            }
            RefreshOutcome::Failed(err) => Err(err),
            RefreshOutcome::Skipped => Err(XdsError::Internal {
                message: "initial source load was skipped".into(),
                source: None,
            }),
        }
    }

    /// Whether an interval has passed since the last attempt.
    pub fn is_due(&self) -> bool {
        match *self.last_attempt.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(last) => last.elapsed() >= self.interval,
            None => true,
        }
    }

    /// Refresh if an interval has passed since the last attempt.
    ///
    /// Returns `None` when no refresh was due.
    pub async fn run_pending(&self) -> Option<RefreshOutcome> {
        {
            let mut last = self.last_attempt.lock().unwrap_or_else(PoisonError::into_inner);
            if last.is_some_and(|last| last.elapsed() < self.interval) {
                return None;
            }
            *last = Some(Instant::now());
        }
        Some(self.tick().await)
    }

    /// Start the interval timer on the current runtime.
    ///
    /// The first tick fires one interval from now, since [`warm_start`]
    /// covers startup.
    ///
    /// [`warm_start`]: Self::warm_start
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + scheduler.interval, scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(interval = ?scheduler.interval, "refresh timer started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.mark_attempt();
                        scheduler.tick().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("refresh timer stopped");
        })
    }

    /// Stop the interval timer.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    fn mark_attempt(&self) {
        *self.last_attempt.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    async fn tick(&self) -> RefreshOutcome {
        let outcome = self.provider.refresh().await;
        if let RefreshOutcome::Failed(err) = &outcome {
            warn!(error = %err, "scheduled refresh failed, keeping previous snapshot");
        }
        outcome
    }
}
