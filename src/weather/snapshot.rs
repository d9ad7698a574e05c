use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::condition::ConditionBucket;

const PLACEHOLDER_HIGH: f64 = -22.0;
const PLACEHOLDER_LOW: f64 = -11.0;

/// Last-known weather as received from the companion.
///
/// Temperatures arrive already converted to display units; nothing here
/// converts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub high_temperature: f64,
    pub low_temperature: f64,
    pub condition_code: i32,
    /// When the companion produced the data.
    pub observed_at: DateTime<Utc>,
    /// Set only on the pre-sync default; no received record carries it.
    #[serde(skip)]
    placeholder: bool,
}

impl Default for WeatherSnapshot {
    fn default() -> Self {
        Self {
            high_temperature: PLACEHOLDER_HIGH,
            low_temperature: PLACEHOLDER_LOW,
            condition_code: 0,
            observed_at: DateTime::<Utc>::UNIX_EPOCH,
            placeholder: true,
        }
    }
}

impl WeatherSnapshot {
    pub fn new(
        high_temperature: f64,
        low_temperature: f64,
        condition_code: i32,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            high_temperature,
            low_temperature,
            condition_code,
            observed_at,
            placeholder: false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn condition(&self) -> ConditionBucket {
        ConditionBucket::from_code(self.condition_code)
    }

    /// Zero when `observed_at` lies in the future (companion clock skew).
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.observed_at).max(Duration::zero())
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.is_placeholder() || self.age(now) > max_age
    }
}

/// The single shared weather cell.
///
/// Holders of a `SnapshotStore` may replace the snapshot; the render path
/// only ever gets a [`SnapshotReader`]. Replacement swaps one `Arc`, so a
/// reader sees either the old record or the new one, never a mix.
#[derive(Clone)]
pub struct SnapshotStore {
    cell: Arc<RwLock<Arc<WeatherSnapshot>>>,
}

impl SnapshotStore {
    pub fn new(initial: WeatherSnapshot) -> Self {
        Self {
            cell: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    pub fn read(&self) -> WeatherSnapshot {
        self.read_shared().as_ref().clone()
    }

    /// Latest committed snapshot without copying it out of the cell.
    pub fn read_shared(&self) -> Arc<WeatherSnapshot> {
        Arc::clone(&read_guard(&self.cell))
    }

    pub fn replace(&self, snapshot: WeatherSnapshot) {
        let next = Arc::new(snapshot);
        *write_guard(&self.cell) = next;
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(WeatherSnapshot::default())
    }
}

/// Read-only view of a [`SnapshotStore`].
#[derive(Clone)]
pub struct SnapshotReader {
    cell: Arc<RwLock<Arc<WeatherSnapshot>>>,
}

impl SnapshotReader {
    pub fn read(&self) -> WeatherSnapshot {
        self.read_shared().as_ref().clone()
    }

    pub fn read_shared(&self) -> Arc<WeatherSnapshot> {
        Arc::clone(&read_guard(&self.cell))
    }
}

// A writer can only panic between taking the guard and storing an `Arc`,
// which leaves the previous value intact, so a poisoned lock is still sound.
fn read_guard<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_guard<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
