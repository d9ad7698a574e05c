use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatsSnapshot {
    pub updates_applied: u64,
    pub malformed_records: u64,
    pub ignored_items: u64,
    pub refresh_requests_sent: u64,
    pub send_failures: u64,
    pub connect_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    updates_applied: AtomicU64,
    malformed_records: AtomicU64,
    ignored_items: AtomicU64,
    refresh_requests_sent: AtomicU64,
    send_failures: AtomicU64,
    connect_failures: AtomicU64,
}

/// Sync-path counters, shared between the client and its session tasks.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    inner: Arc<Counters>,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_update(&self) {
        self.inner.updates_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.inner.malformed_records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.inner.ignored_items.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_sent(&self) {
        self.inner.refresh_requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.inner.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect_failure(&self) {
        self.inner.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncStatsSnapshot {
        let c = &self.inner;
        SyncStatsSnapshot {
            updates_applied: c.updates_applied.load(Ordering::Relaxed),
            malformed_records: c.malformed_records.load(Ordering::Relaxed),
            ignored_items: c.ignored_items.load(Ordering::Relaxed),
            refresh_requests_sent: c.refresh_requests_sent.load(Ordering::Relaxed),
            send_failures: c.send_failures.load(Ordering::Relaxed),
            connect_failures: c.connect_failures.load(Ordering::Relaxed),
        }
    }
}
