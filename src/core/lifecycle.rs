//! Manual update triggers, the delayed re-fetch that follows them, and
//! periodic polling.

use super::config::RefreshConfig;
use super::orchestrator::DataOrchestrator;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_UPDATE_MESSAGE: &str = "Data refresh started";
pub const TRIGGER_ERROR_PREFIX: &str = "Failed to trigger update";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateStatus {
    pub is_updating: bool,
    /// Time of the last successful trigger. Never moves backwards.
    pub last_updated: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Completed,
    Failed,
    /// Another trigger was still running; nothing was done.
    AlreadyUpdating,
}

pub struct UpdateLifecycle {
    orchestrator: Arc<DataOrchestrator>,
    poll_interval: Duration,
    settle_delay: Duration,
    updating: AtomicBool,
    status: watch::Sender<UpdateStatus>,
    pending_refetch: Mutex<Option<JoinHandle<()>>>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

/// Holds the single-flight flag. Releasing it also clears `is_updating`, so a
/// cancelled trigger cannot leave the manager stuck.
struct UpdatingGuard<'a> {
    flag: &'a AtomicBool,
    status: &'a watch::Sender<UpdateStatus>,
}

impl<'a> UpdatingGuard<'a> {
    fn acquire(flag: &'a AtomicBool, status: &'a watch::Sender<UpdateStatus>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        status.send_modify(|s| {
            s.is_updating = true;
            s.error = None;
        });
        Some(UpdatingGuard { flag, status })
    }
}

impl Drop for UpdatingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.status.send_modify(|s| s.is_updating = false);
    }
}

impl UpdateLifecycle {
    pub fn new(orchestrator: Arc<DataOrchestrator>, config: &RefreshConfig) -> Self {
        Self::with_timing(orchestrator, config.poll_interval(), config.settle_delay())
    }

    pub fn with_timing(
        orchestrator: Arc<DataOrchestrator>,
        poll_interval: Duration,
        settle_delay: Duration,
    ) -> Self {
        let (status, _) = watch::channel(UpdateStatus::default());
        Self {
            orchestrator,
            poll_interval,
            settle_delay,
            updating: AtomicBool::new(false),
            status,
            pending_refetch: Mutex::new(None),
            poller: Mutex::new(None),
        }
    }

    pub fn orchestrator(&self) -> &Arc<DataOrchestrator> {
        &self.orchestrator
    }

    pub fn status(&self) -> UpdateStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UpdateStatus> {
        self.status.subscribe()
    }

    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    /// Asks the service to recompute its data. On success one re-fetch is
    /// scheduled after the settle delay.
    #[instrument(name = "TriggerUpdate", skip(self))]
    pub async fn trigger_update(&self) -> TriggerOutcome {
        let Some(_guard) = UpdatingGuard::acquire(&self.updating, &self.status) else {
            debug!("Update already in progress");
            return TriggerOutcome::AlreadyUpdating;
        };

        match self.orchestrator.request_update().await {
            Ok(ack) => {
                let message = ack
                    .message
                    .unwrap_or_else(|| DEFAULT_UPDATE_MESSAGE.to_string());
                info!(%message, "Update triggered");
                let now = Utc::now();
                self.status.send_modify(|s| {
                    s.last_updated = Some(s.last_updated.map_or(now, |prev| prev.max(now)));
                    s.message = Some(message);
                    s.error = None;
                });
                self.schedule_refetch().await;
                TriggerOutcome::Completed
            }
            Err(e) => {
                warn!(error = %e, "Update trigger failed");
                self.status.send_modify(|s| {
                    s.error = Some(format!("{TRIGGER_ERROR_PREFIX}: {e}"));
                });
                TriggerOutcome::Failed
            }
        }
    }

    /// Replaces any pending re-fetch with a new one `settle_delay` from now.
    async fn schedule_refetch(&self) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let delay = self.settle_delay;
        let mut pending = self.pending_refetch.lock().await;
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("Re-fetching after update");
            // Errors already land in the orchestrator state.
            let _ = orchestrator.load_snapshot(false).await;
        }));
    }

    pub async fn has_pending_refetch(&self) -> bool {
        self.pending_refetch
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Re-loads the snapshot every poll interval. The first load happens one
    /// interval from now. Calling again replaces the running poller.
    pub async fn start_polling(&self) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let period = self.poll_interval;
        let mut poller = self.poller.lock().await;
        if let Some(previous) = poller.take() {
            previous.abort();
        }
        info!(interval_secs = period.as_secs(), "Starting poller");
        *poller = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                debug!("Polling for new data");
                let _ = orchestrator.load_snapshot(false).await;
            }
        }));
    }

    pub async fn stop_polling(&self) {
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
    }

    /// Stops all background work. Loads still in flight finish but their
    /// results are ignored.
    pub async fn shutdown(&self) {
        self.stop_polling().await;
        if let Some(handle) = self.pending_refetch.lock().await.take() {
            handle.abort();
        }
        self.orchestrator.close();
        debug!("Update lifecycle shut down");
    }
}

impl Drop for UpdateLifecycle {
    fn drop(&mut self) {
        for slot in [&self.poller, &self.pending_refetch] {
            if let Ok(mut guard) = slot.try_lock()
                && let Some(handle) = guard.take()
            {
                handle.abort();
            }
        }
        self.orchestrator.close();
    }
}
