use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Start of a timer whose interval does not fit after `now`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Callback invoked on every tick of a timer
pub type TickFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Opaque handle to a running timer
#[derive(Debug)]
pub struct TimerHandle {
    id: u64,
    token: CancellationToken,
}

impl TimerHandle {
    pub fn new(id: u64, token: CancellationToken) -> Self {
        Self { id, token }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Minimal capability the scheduler needs from a timer implementation
pub trait TimerEngine: Send + Sync {
    /// Run `tick` every `interval`, first firing one interval from now
    fn schedule(&self, interval: Duration, tick: TickFn) -> TimerHandle;

    /// Stop future ticks. Executions already running are not interrupted.
    fn cancel(&self, handle: TimerHandle);
}

/// Timer engine backed by tokio tasks.
///
/// Each timer is one driver task. Every tick is spawned as its own task
/// so executions of the same timer may overlap, and cancelling the driver
/// never aborts a tick in progress.
#[derive(Default)]
pub struct TokioTimerEngine {
    next_id: AtomicU64,
}

impl TokioTimerEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimerEngine for TokioTimerEngine {
    fn schedule(&self, interval: Duration, tick: TickFn) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let driver_token = token.clone();

        tokio::spawn(async move {
            let mut ticker = interval_at(first_deadline(Instant::now(), interval), interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = driver_token.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::spawn(run_guarded(id, Arc::clone(&tick)));
                    }
                }
            }

            debug!(timer_id = id, "Timer stopped");
        });

        TimerHandle::new(id, token)
    }

    fn cancel(&self, handle: TimerHandle) {
        handle.token.cancel();
    }
}

/// When the first tick is due; saturates instead of overflowing `Instant`
fn first_deadline(now: Instant, interval: Duration) -> Instant {
    now.checked_add(interval)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Run one tick, catching panics from both building and polling the future
async fn run_guarded(timer_id: u64, tick: TickFn) {
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| tick())) {
        Ok(future) => future,
        Err(payload) => {
            error!(
                timer_id,
                panic = %panic_message(payload.as_ref()),
                "Scheduled callback panicked"
            );
            return;
        }
    };

    if let Err(payload) = AssertUnwindSafe(future).catch_unwind().await {
        error!(
            timer_id,
            panic = %panic_message(payload.as_ref()),
            "Scheduled callback panicked"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    fn counting_tick(counter: Arc<AtomicUsize>) -> TickFn {
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_interval() {
        let engine = TokioTimerEngine::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = engine.schedule(Duration::from_secs(1), counting_tick(counter.clone()));

        sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(2_000)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        engine.cancel(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_future_ticks() {
        let engine = TokioTimerEngine::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = engine.schedule(Duration::from_secs(1), counting_tick(counter.clone()));

        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        engine.cancel(handle);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_does_not_interrupt_running_tick() {
        let engine = TokioTimerEngine::new();
        let finished = Arc::new(AtomicUsize::new(0));
        let done = finished.clone();
        let tick: TickFn = Arc::new(move || {
            let done = Arc::clone(&done);
            async move {
                sleep(Duration::from_secs(5)).await;
                done.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        });

        let handle = engine.schedule(Duration::from_secs(1), tick);
        sleep(Duration::from_millis(1_500)).await;
        engine.cancel(handle);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_tick_does_not_stop_timer() {
        let engine = TokioTimerEngine::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let tick: TickFn = Arc::new(move || {
            let call = seen.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                panic!("callback construction failed");
            }
            async move {
                if call == 1 {
                    panic!("callback body failed");
                }
            }
            .boxed()
        });

        let handle = engine.schedule(Duration::from_secs(1), tick);
        sleep(Duration::from_millis(3_500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        engine.cancel(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_does_not_panic() {
        let now = Instant::now();
        assert_eq!(first_deadline(now, Duration::from_secs(5)), now + Duration::from_secs(5));
        assert_eq!(first_deadline(now, Duration::MAX), now + FAR_FUTURE);

        let engine = TokioTimerEngine::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = engine.schedule(Duration::MAX, counting_tick(counter.clone()));

        sleep(Duration::from_secs(3_600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!handle.is_cancelled());
        engine.cancel(handle);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
