use crate::error::{Result, RuntimeError};
use crate::reconciler::ScheduleReconciler;
use crate::traits::ProbeStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use vigil_sync::SyncChannel;

/// Background consumption loop owned by a started job
struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Start/stop lifecycle of the probe pipeline on one instance
pub struct ProbeJob {
    store: Arc<dyn ProbeStore>,
    reconciler: Arc<ScheduleReconciler>,
    channel: Arc<dyn SyncChannel>,
    running: Mutex<Option<RunningLoop>>,
}

impl ProbeJob {
    pub fn new(
        store: Arc<dyn ProbeStore>,
        reconciler: Arc<ScheduleReconciler>,
        channel: Arc<dyn SyncChannel>,
    ) -> Self {
        Self {
            store,
            reconciler,
            channel,
            running: Mutex::new(None),
        }
    }

    /// Load the active set and begin consuming schedule-change events.
    ///
    /// The subscription is opened before the snapshot is read so that no
    /// change committed in between is missed. Failing to subscribe or to
    /// fetch the snapshot aborts startup with nothing running. Returns the
    /// number of probes scheduled from the snapshot.
    pub async fn start(&self, parent: &CancellationToken) -> Result<usize> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(RuntimeError::AlreadyRunning);
        }

        let events = self.channel.subscribe().await.map_err(|e| {
            RuntimeError::startup_failed(
                format!("failed to subscribe to '{}'", self.channel.channel()),
                e.into(),
            )
        })?;

        let definitions = self.store.fetch_active_definitions().await.map_err(|e| {
            RuntimeError::startup_failed("failed to fetch active probe definitions", e)
        })?;

        let loaded = self.reconciler.load(definitions).await;

        let token = parent.child_token();
        let handle = {
            let reconciler = Arc::clone(&self.reconciler);
            let token = token.clone();
            tokio::spawn(async move { reconciler.run(events, token).await })
        };

        *running = Some(RunningLoop { token, handle });
        info!(
            channel = %self.channel.channel(),
            "Probe job started with {} scheduled probes",
            loaded
        );

        Ok(loaded)
    }

    /// Stop consuming events and wait for the loop to exit.
    ///
    /// Installed schedules keep firing; shut the scheduler down separately.
    /// Calling this on a stopped job does nothing.
    pub async fn stop(&self) -> Result<()> {
        let Some(running) = self.running.lock().await.take() else {
            debug!("Probe job not running");
            return Ok(());
        };

        running.token.cancel();
        if let Err(e) = running.handle.await {
            error!(error = %e, "Schedule reconciler task ended abnormally");
        }

        info!("Probe job stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}
