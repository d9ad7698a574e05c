use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

use tokio::{runtime::Handle, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::{error::FaceError, face::Renderer};

use super::{boundary::next_boundary, clock::Clock};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Arm/disarm surface the power controller drives.
pub trait TickControl {
    fn arm(&mut self);
    fn disarm(&mut self);
    fn is_armed(&self) -> bool;
}

struct PendingTick {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Boundary-aligned redraw ticks while armed, nothing while disarmed.
///
/// One tokio task carries the single pending tick. Firing and `disarm` both
/// go through `fire_gate`, so once `disarm` returns no tick of that
/// generation can still reach the renderer.
pub struct TickScheduler {
    runtime: Handle,
    clock: Arc<dyn Clock>,
    renderer: Arc<dyn Renderer>,
    interval_ms: u64,
    fire_gate: Arc<Mutex<()>>,
    pending: Option<PendingTick>,
    fired: Arc<AtomicU64>,
}

impl TickScheduler {
    /// Fails when no tokio runtime is reachable from the calling thread.
    pub fn new(
        interval_ms: u64,
        clock: Arc<dyn Clock>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, FaceError> {
        if interval_ms == 0 {
            return Err(FaceError::InvalidTickInterval(interval_ms));
        }

        let runtime = Handle::try_current()
            .map_err(|err| FaceError::SchedulerUnavailable(err.to_string()))?;

        Ok(Self {
            runtime,
            clock,
            renderer,
            interval_ms,
            fire_gate: Arc::new(Mutex::new(())),
            pending: None,
            fired: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Ticks delivered to the renderer since construction.
    pub fn fired_ticks(&self) -> u64 {
        self.fired.load(Ordering::SeqCst)
    }

    fn spawn_ticker(&self) -> PendingTick {
        let token = CancellationToken::new();
        let first = next_boundary(self.clock.now_ms(), self.interval_ms);
        log_debug!(
            "tick armed, first boundary at {first} ({}ms away)",
            first - self.clock.now_ms()
        );

        let handle = self.runtime.spawn(tick_loop(
            Arc::clone(&self.clock),
            Arc::clone(&self.renderer),
            self.interval_ms,
            first,
            Arc::clone(&self.fire_gate),
            token.clone(),
            Arc::clone(&self.fired),
        ));

        PendingTick { token, handle }
    }
}

impl TickControl for TickScheduler {
    fn arm(&mut self) {
        if self.pending.is_some() {
            return;
        }
        self.pending = Some(self.spawn_ticker());
    }

    fn disarm(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        {
            let _gate = lock_gate(&self.fire_gate);
            pending.token.cancel();
        }
        pending.handle.abort();
        log_debug!("tick disarmed after {} ticks", self.fired_ticks());
    }

    fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        if self.pending.is_some() {
            log_info!("tick scheduler dropped while armed; cancelling");
            self.disarm();
        }
    }
}

async fn tick_loop(
    clock: Arc<dyn Clock>,
    renderer: Arc<dyn Renderer>,
    interval_ms: u64,
    first_boundary: i64,
    fire_gate: Arc<Mutex<()>>,
    token: CancellationToken,
    fired: Arc<AtomicU64>,
) {
    let mut target = first_boundary;

    loop {
        let wait_ms = target.saturating_sub(clock.now_ms()).max(0) as u64;

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = time::sleep(time::Duration::from_millis(wait_ms)) => {}
        }

        {
            let _gate = lock_gate(&fire_gate);
            if token.is_cancelled() {
                break;
            }
            fired.fetch_add(1, Ordering::SeqCst);
            renderer.request_redraw();
        }

        // Re-align from the firing time. A timer that woke a hair early
        // still lands on the following boundary, never the same one twice.
        target = next_boundary(clock.now_ms().max(target), interval_ms);
    }
}

fn lock_gate(gate: &Mutex<()>) -> MutexGuard<'_, ()> {
    match gate.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick::clock::AnchoredClock;
    use std::time::Duration;

    const EPOCH_MS: i64 = 1_700_000_000_250;

    /// Records the wall time of every redraw.
    struct RecordingRenderer {
        clock: AnchoredClock,
        fired_at: Mutex<Vec<i64>>,
    }

    impl RecordingRenderer {
        fn times(&self) -> Vec<i64> {
            self.fired_at.lock().unwrap().clone()
        }
    }

    impl Renderer for RecordingRenderer {
        fn request_redraw(&self) {
            self.fired_at.lock().unwrap().push(self.clock.now_ms());
        }
    }

    fn scheduler() -> (TickScheduler, Arc<RecordingRenderer>) {
        let clock = AnchoredClock::new(EPOCH_MS);
        let renderer = Arc::new(RecordingRenderer {
            clock,
            fired_at: Mutex::new(Vec::new()),
        });
        let scheduler = TickScheduler::new(1_000, Arc::new(clock), renderer.clone()).unwrap();
        (scheduler, renderer)
    }

    #[test]
    fn construction_without_runtime_is_fatal() {
        let renderer = Arc::new(crate::face::RedrawSignal::new());
        let result = TickScheduler::new(1_000, Arc::new(AnchoredClock::new(0)), renderer);
        assert!(matches!(result, Err(FaceError::SchedulerUnavailable(_))));
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let renderer = Arc::new(crate::face::RedrawSignal::new());
        let result = TickScheduler::new(0, Arc::new(AnchoredClock::new(0)), renderer);
        assert!(matches!(result, Err(FaceError::InvalidTickInterval(0))));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_land_on_second_boundaries() {
        let (mut scheduler, renderer) = scheduler();
        scheduler.arm();

        time::sleep(Duration::from_millis(3_800)).await;

        assert_eq!(
            renderer.times(),
            vec![
                1_700_000_001_000,
                1_700_000_002_000,
                1_700_000_003_000,
                1_700_000_004_000
            ]
        );
        assert_eq!(scheduler.fired_ticks(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn arm_is_idempotent() {
        let (mut scheduler, renderer) = scheduler();
        scheduler.arm();
        scheduler.arm();
        scheduler.arm();

        time::sleep(Duration::from_millis(1_800)).await;
        assert_eq!(renderer.times().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_after_disarm() {
        let (mut scheduler, renderer) = scheduler();
        scheduler.arm();
        time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(renderer.times().len(), 1);

        scheduler.disarm();
        scheduler.disarm();
        assert!(!scheduler.is_armed());

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(renderer.times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_then_arm_keeps_exactly_one_pending_tick() {
        let (mut scheduler, renderer) = scheduler();
        scheduler.arm();
        time::sleep(Duration::from_millis(300)).await;

        scheduler.disarm();
        scheduler.arm();

        time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(renderer.times(), vec![1_700_000_001_000]);
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_without_arm_is_safe() {
        let (mut scheduler, renderer) = scheduler();
        scheduler.disarm();
        time::sleep(Duration::from_secs(3)).await;
        assert!(renderer.times().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_scheduler_cancels_the_pending_tick() {
        let (mut scheduler, renderer) = scheduler();
        scheduler.arm();
        drop(scheduler);

        time::sleep(Duration::from_secs(3)).await;
        assert!(renderer.times().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn callback_latency_does_not_accumulate_drift() {
        use std::sync::atomic::AtomicI64;

        /// Wall clock that runs ahead of tokio time by the latency the
        /// renderer has spent so far.
        struct LaggingClock {
            base: AnchoredClock,
            lag_ms: AtomicI64,
        }

        impl Clock for LaggingClock {
            fn now_ms(&self) -> i64 {
                self.base.now_ms() + self.lag_ms.load(Ordering::SeqCst)
            }
        }

        struct SlowRenderer {
            clock: Arc<LaggingClock>,
            fired_at: Mutex<Vec<i64>>,
        }

        impl Renderer for SlowRenderer {
            fn request_redraw(&self) {
                self.fired_at.lock().unwrap().push(self.clock.now_ms());
                self.clock.lag_ms.fetch_add(37, Ordering::SeqCst);
            }
        }

        let clock = Arc::new(LaggingClock {
            base: AnchoredClock::new(EPOCH_MS),
            lag_ms: AtomicI64::new(0),
        });
        let renderer = Arc::new(SlowRenderer {
            clock: clock.clone(),
            fired_at: Mutex::new(Vec::new()),
        });
        let mut scheduler = TickScheduler::new(1_000, clock, renderer.clone()).unwrap();

        scheduler.arm();
        time::sleep(Duration::from_millis(4_500)).await;

        let times = renderer.fired_at.lock().unwrap().clone();
        assert!(times.len() >= 4);
        assert!(times.iter().all(|t| t % 1_000 == 0));
        for pair in times.windows(2) {
            assert_eq!(pair[1] - pair[0], 1_000);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn disarm_racing_a_firing_tick_leaves_no_late_redraw() {
        use crate::tick::{boundary::delay_until_next_boundary, SystemClock};
        use std::sync::atomic::AtomicUsize;

        /// Keeps the fire gate held for a moment on every redraw.
        #[derive(Default)]
        struct BusyRenderer {
            in_flight: AtomicUsize,
            redraws: AtomicUsize,
        }

        impl Renderer for BusyRenderer {
            fn request_redraw(&self) {
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(2));
                self.redraws.fetch_add(1, Ordering::SeqCst);
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        }

        let renderer = Arc::new(BusyRenderer::default());
        let mut scheduler = TickScheduler::new(5, Arc::new(SystemClock), renderer.clone()).unwrap();

        for round in 0..60 {
            let before = renderer.redraws.load(Ordering::SeqCst);
            scheduler.arm();

            if round % 2 == 0 {
                // Disarm while a redraw holds the gate.
                while renderer.in_flight.load(Ordering::SeqCst) == 0
                    && renderer.redraws.load(Ordering::SeqCst) == before
                {
                    std::thread::yield_now();
                }
            } else {
                // Disarm right around the next boundary.
                std::thread::sleep(delay_until_next_boundary(SystemClock.now_ms(), 5));
            }

            scheduler.disarm();
            assert_eq!(renderer.in_flight.load(Ordering::SeqCst), 0);

            let settled = renderer.redraws.load(Ordering::SeqCst);
            assert_eq!(scheduler.fired_ticks() as usize, settled);

            std::thread::sleep(Duration::from_millis(15));
            assert_eq!(renderer.redraws.load(Ordering::SeqCst), settled);
        }
    }
}
