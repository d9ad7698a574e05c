use std::time::Duration;

/// The first interval boundary strictly after `now_ms`.
///
/// `now + (interval - now mod interval)`: a call landing exactly on a
/// boundary yields the following one.
pub fn next_boundary(now_ms: i64, interval_ms: u64) -> i64 {
    let interval = i64::try_from(interval_ms).unwrap_or(i64::MAX).max(1);
    let remainder = now_ms.rem_euclid(interval);
    now_ms.saturating_add(interval - remainder)
}

pub fn delay_until_next_boundary(now_ms: i64, interval_ms: u64) -> Duration {
    let delay = next_boundary(now_ms, interval_ms).saturating_sub(now_ms);
    Duration::from_millis(delay.max(0) as u64)
}
