use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{error::SyncError, weather::DataMap};

/// Identifier of a reachable companion node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored data item, addressed by path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    pub path: String,
    pub data: DataMap,
}

impl DataItem {
    pub fn new(path: impl Into<String>, data: DataMap) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataEventKind {
    Created,
    Modified,
    Deleted,
}

/// One entry of a data-changed notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEvent {
    pub kind: DataEventKind,
    pub item: DataItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

/// A registered push listener.
///
/// Batches arrive on `events`; the stream ending means the link is gone.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub events: mpsc::Receiver<Vec<DataEvent>>,
}

/// The companion link as seen from the face.
///
/// Every call completes asynchronously; the sync client only awaits them
/// from its own session task.
pub trait CompanionTransport: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<(), SyncError>> + Send;

    /// Release the link. Listeners must already be unregistered.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    fn discover_nodes(&self) -> impl Future<Output = Result<Vec<NodeId>, SyncError>> + Send;

    /// Resolves `Ok` once the node acknowledged delivery.
    fn send_message(
        &self,
        node: &NodeId,
        path: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), SyncError>> + Send;

    fn fetch_data_items(&self) -> impl Future<Output = Result<Vec<DataItem>, SyncError>> + Send;

    fn subscribe(&self) -> impl Future<Output = Result<Subscription, SyncError>> + Send;

    fn unsubscribe(&self, id: SubscriptionId) -> impl Future<Output = ()> + Send;
}
