use crate::error::Result;
use crate::probes::ProbeExecutor;
use futures_util::{FutureExt, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vigil_core::{decode_event, ProbeDefinition, ScheduleAction};
use vigil_scheduler::{AddOutcome, RecurringScheduler, RemoveOutcome, TickFn};
use vigil_sync::EventStream;

/// What applying one definition did to the local schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Scheduled(AddOutcome),
    Removed(RemoveOutcome),
}

/// Keeps the local scheduler in line with definition lifecycle events
pub struct ScheduleReconciler {
    scheduler: Arc<RecurringScheduler>,
    executor: Arc<ProbeExecutor>,
}

impl ScheduleReconciler {
    pub fn new(scheduler: Arc<RecurringScheduler>, executor: Arc<ProbeExecutor>) -> Self {
        Self {
            scheduler,
            executor,
        }
    }

    pub fn scheduler(&self) -> &Arc<RecurringScheduler> {
        &self.scheduler
    }

    /// Apply one definition snapshot.
    ///
    /// Stopped or soft-deleted definitions are unscheduled, absence being
    /// fine. Everything else is added. Both directions are versioned by
    /// `updated_at`, so a reordered or redelivered older snapshot never
    /// overrides a newer one.
    pub async fn apply(&self, definition: &ProbeDefinition) -> Result<Reconciled> {
        match definition.schedule_action() {
            ScheduleAction::Remove => {
                let outcome = self
                    .scheduler
                    .remove(definition.id, definition.updated_at)
                    .await;
                Ok(Reconciled::Removed(outcome))
            }
            ScheduleAction::Upsert => {
                let outcome = self
                    .scheduler
                    .add(
                        definition.id,
                        definition.updated_at,
                        &definition.interval,
                        self.tick_for(definition.clone()),
                    )
                    .await?;
                Ok(Reconciled::Scheduled(outcome))
            }
        }
    }

    /// Decode a schedule-change payload and apply it
    pub async fn apply_payload(&self, payload: &str) -> Result<Reconciled> {
        let definition = decode_event(payload)?;
        self.apply(&definition).await
    }

    /// Apply a full snapshot, skipping definitions that fail.
    ///
    /// Returns how many definitions ended up scheduled.
    pub async fn load(&self, definitions: Vec<ProbeDefinition>) -> usize {
        let total = definitions.len();
        let mut scheduled = 0;

        for definition in &definitions {
            match self.apply(definition).await {
                Ok(Reconciled::Scheduled(_)) => scheduled += 1,
                Ok(Reconciled::Removed(_)) => {
                    debug!(probe_id = definition.id, "Skipping inactive definition in snapshot")
                }
                Err(e) => error!(
                    probe_id = definition.id,
                    interval = %definition.interval,
                    error = %e,
                    "Failed to schedule probe from snapshot"
                ),
            }
        }

        info!("Loaded {} of {} active probe definitions", scheduled, total);
        scheduled
    }

    /// Consume schedule-change events until cancelled or the stream ends
    pub async fn run(&self, mut events: EventStream, token: CancellationToken) {
        info!("Starting schedule reconciler");

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Schedule reconciler shutting down");
                    break;
                }
                next = events.next() => match next {
                    Some(payload) => {
                        if let Err(e) = self.apply_payload(&payload).await {
                            warn!(error = %e, "Dropping schedule-change event");
                        }
                    }
                    None => {
                        warn!("Schedule-change stream closed, reconciler exiting");
                        break;
                    }
                }
            }
        }
    }

    /// Callback bound to one definition snapshot
    fn tick_for(&self, definition: ProbeDefinition) -> TickFn {
        let definition = Arc::new(definition);
        let executor = Arc::clone(&self.executor);

        Arc::new(move || {
            let definition = Arc::clone(&definition);
            let executor = Arc::clone(&executor);
            async move {
                executor.execute(&definition).await;
            }
            .boxed()
        })
    }
}
