pub mod backoff;
pub mod client;
pub mod loopback;
pub mod stats;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use client::{CompanionSyncClient, SyncOptions, SyncSession, SyncState};
pub use loopback::{LoopbackTransport, TransportCall};
pub use stats::{SyncStats, SyncStatsSnapshot};
pub use transport::{
    CompanionTransport, DataEvent, DataEventKind, DataItem, NodeId, Subscription, SubscriptionId,
};
