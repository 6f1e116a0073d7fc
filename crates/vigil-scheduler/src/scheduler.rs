use crate::registry::{AddOutcome, ProbeRegistry, RemoveOutcome};
use crate::timer::{TickFn, TimerEngine, TokioTimerEngine};
use crate::{Result, SchedulerError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use vigil_core::{format_interval, parse_interval, ProbeId};

/// Recurring scheduler: one timer per probe, replaced only by newer versions
pub struct RecurringScheduler {
    registry: ProbeRegistry,
    engine: Arc<dyn TimerEngine>,
}

impl RecurringScheduler {
    pub fn new(engine: Arc<dyn TimerEngine>) -> Self {
        Self {
            registry: ProbeRegistry::new(),
            engine,
        }
    }

    /// Scheduler driven by tokio timers
    pub fn with_tokio() -> Self {
        Self::new(Arc::new(TokioTimerEngine::new()))
    }

    /// Register `tick` to run every `interval` for `key`.
    ///
    /// An equal version is a no-op and an older version is ignored. An
    /// interval that does not parse to a positive duration is an error and
    /// leaves any installed entry running.
    pub async fn add(
        &self,
        key: ProbeId,
        version: DateTime<Utc>,
        interval: &str,
        tick: TickFn,
    ) -> Result<AddOutcome> {
        let period = parse_interval(interval)
            .map_err(|e| SchedulerError::invalid_interval(key, interval, e))?;

        let outcome = self
            .registry
            .install(self.engine.as_ref(), key, version, period, tick)
            .await;

        match outcome {
            AddOutcome::Scheduled => info!(
                probe_id = key,
                interval = %format_interval(period),
                "Scheduled probe"
            ),
            AddOutcome::Replaced => info!(
                probe_id = key,
                interval = %format_interval(period),
                %version,
                "Rescheduled probe with newer definition"
            ),
            AddOutcome::Unchanged => debug!(probe_id = key, %version, "Probe already scheduled"),
            AddOutcome::Stale => warn!(
                probe_id = key,
                %version,
                "Ignoring out-of-order definition older than the scheduled one"
            ),
        }

        Ok(outcome)
    }

    /// Stop the entry for `key` as of `version`.
    ///
    /// Absence is not an error. A removal older than the installed version
    /// is ignored, and once removed the key only accepts strictly newer adds.
    pub async fn remove(&self, key: ProbeId, version: DateTime<Utc>) -> RemoveOutcome {
        let outcome = self.registry.remove(self.engine.as_ref(), key, version).await;
        match outcome {
            RemoveOutcome::Removed => info!(probe_id = key, "Unscheduled probe"),
            RemoveOutcome::Absent => debug!(probe_id = key, "No schedule to remove"),
            RemoveOutcome::Stale => warn!(
                probe_id = key,
                %version,
                "Ignoring out-of-order removal older than the scheduled definition"
            ),
        }
        outcome
    }

    pub async fn scheduled_version(&self, key: ProbeId) -> Option<DateTime<Utc>> {
        self.registry.version_of(key).await
    }

    pub async fn scheduled_interval(&self, key: ProbeId) -> Option<Duration> {
        self.registry.interval_of(key).await
    }

    pub async fn scheduled_keys(&self) -> Vec<ProbeId> {
        self.registry.keys().await
    }

    pub async fn len(&self) -> usize {
        self.registry.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.registry.is_empty().await
    }

    /// Cancel every scheduled probe
    pub async fn shutdown(&self) -> usize {
        let cancelled = self.registry.clear(self.engine.as_ref()).await;
        info!("Scheduler stopped, cancelled {} probe schedules", cancelled);
        cancelled
    }
}

impl Default for RecurringScheduler {
    fn default() -> Self {
        Self::with_tokio()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counting_tick(counter: &Arc<AtomicUsize>) -> TickFn {
        let counter = Arc::clone(counter);
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_add_keeps_single_timer() {
        let scheduler = RecurringScheduler::with_tokio();
        let counter = Arc::new(AtomicUsize::new(0));
        let version = Utc::now();

        let first = scheduler.add(1, version, "1s", counting_tick(&counter)).await.unwrap();
        let second = scheduler.add(1, version, "1s", counting_tick(&counter)).await.unwrap();
        assert_eq!(first, AddOutcome::Scheduled);
        assert_eq!(second, AddOutcome::Unchanged);

        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.len().await, 1);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_version_swaps_callbacks() {
        let scheduler = RecurringScheduler::with_tokio();
        let old_calls = Arc::new(AtomicUsize::new(0));
        let new_calls = Arc::new(AtomicUsize::new(0));
        let t1 = Utc::now();
        let t2 = t1 + ChronoDuration::seconds(1);

        scheduler.add(1, t1, "1s", counting_tick(&old_calls)).await.unwrap();
        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(old_calls.load(Ordering::SeqCst), 1);

        let outcome = scheduler.add(1, t2, "2s", counting_tick(&new_calls)).await.unwrap();
        assert_eq!(outcome, AddOutcome::Replaced);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(old_calls.load(Ordering::SeqCst), 1);
        assert_eq!(new_calls.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.scheduled_interval(1).await, Some(Duration::from_secs(2)));

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_older_version_ignored() {
        let scheduler = RecurringScheduler::with_tokio();
        let counter = Arc::new(AtomicUsize::new(0));
        let t1 = Utc::now();
        let t2 = t1 + ChronoDuration::seconds(1);

        scheduler.add(1, t2, "10s", counting_tick(&counter)).await.unwrap();
        let outcome = scheduler.add(1, t1, "1s", counting_tick(&counter)).await.unwrap();

        assert_eq!(outcome, AddOutcome::Stale);
        assert_eq!(scheduler.scheduled_version(1).await, Some(t2));
        assert_eq!(scheduler.scheduled_interval(1).await, Some(Duration::from_secs(10)));

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_stops_ticks() {
        let scheduler = RecurringScheduler::with_tokio();
        let counter = Arc::new(AtomicUsize::new(0));

        let t1 = Utc::now();
        let t2 = t1 + ChronoDuration::seconds(1);

        scheduler.add(1, t1, "1s", counting_tick(&counter)).await.unwrap();
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        assert_eq!(scheduler.remove(1, t2).await, RemoveOutcome::Removed);
        assert_eq!(scheduler.remove(1, t2).await, RemoveOutcome::Absent);

        // Redelivered original definition stays stopped
        let outcome = scheduler.add(1, t1, "1s", counting_tick(&counter)).await.unwrap();
        assert_eq!(outcome, AddOutcome::Stale);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(scheduler.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_interval_leaves_entry_untouched() {
        let scheduler = RecurringScheduler::with_tokio();
        let counter = Arc::new(AtomicUsize::new(0));
        let t1 = Utc::now();
        let t2 = t1 + ChronoDuration::seconds(1);

        scheduler.add(1, t1, "1s", counting_tick(&counter)).await.unwrap();

        let err = scheduler
            .add(1, t2, "soon", counting_tick(&counter))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidInterval { key: 1, .. }));
        assert_eq!(scheduler.scheduled_version(1).await, Some(t1));

        let err = scheduler.add(2, t1, "0s", counting_tick(&counter)).await;
        assert!(err.is_err());
        assert_eq!(scheduler.scheduled_keys().await, vec![1]);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_entry_is_isolated() {
        let scheduler = RecurringScheduler::with_tokio();
        let healthy = Arc::new(AtomicUsize::new(0));
        let faulty_calls = Arc::new(AtomicUsize::new(0));

        let faulty_seen = Arc::clone(&faulty_calls);
        let faulty: TickFn = Arc::new(move || {
            let faulty_seen = Arc::clone(&faulty_seen);
            async move {
                faulty_seen.fetch_add(1, Ordering::SeqCst);
                panic!("probe callback exploded");
            }
            .boxed()
        });

        scheduler.add(1, Utc::now(), "1s", faulty).await.unwrap();
        scheduler.add(2, Utc::now(), "1s", counting_tick(&healthy)).await.unwrap();

        sleep(Duration::from_millis(3_500)).await;
        assert_eq!(faulty_calls.load(Ordering::SeqCst), 3);
        assert_eq!(healthy.load(Ordering::SeqCst), 3);

        assert_eq!(scheduler.shutdown().await, 2);
    }
}
