use chrono::{DateTime, TimeZone, Utc};
use tokio::time::Instant;

/// Wall-clock source in epoch milliseconds.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> i64;

    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.now_ms())
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// The system's real-time clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Wall time derived from a fixed epoch anchor plus tokio's monotonic clock.
///
/// Under a paused tokio runtime this advances only when tokio time does,
/// which makes boundary arithmetic reproducible.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    epoch_ms: i64,
    anchor: Instant,
}

impl AnchoredClock {
    pub fn new(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            anchor: Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now_ms(&self) -> i64 {
        let elapsed = self.anchor.elapsed().as_millis();
        self.epoch_ms
            .saturating_add(i64::try_from(elapsed).unwrap_or(i64::MAX))
    }
}
