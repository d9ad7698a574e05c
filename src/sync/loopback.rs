use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};
use tokio::sync::mpsc;

use crate::{
    error::SyncError,
    weather::{encode_weather, WeatherSnapshot},
};

use super::transport::{
    CompanionTransport, DataEvent, DataEventKind, DataItem, NodeId, Subscription, SubscriptionId,
};

const SUBSCRIBER_BUFFER: usize = 64;

/// Every transport call, in the order the face made them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Disconnect,
    DiscoverNodes,
    SendMessage { node: NodeId, path: String },
    FetchDataItems,
    Subscribe(SubscriptionId),
    Unsubscribe(SubscriptionId),
}

#[derive(Default)]
struct LoopbackState {
    connected: bool,
    nodes: Vec<NodeId>,
    items: BTreeMap<String, DataItem>,
    subscribers: HashMap<SubscriptionId, mpsc::Sender<Vec<DataEvent>>>,
    next_subscription: u64,
    connect_failures_left: u32,
    fail_sends: bool,
    respond_to_requests: bool,
    calls: Vec<TransportCall>,
}

/// In-process companion device.
///
/// Stores data items, pushes change notifications to subscribers and can
/// answer refresh requests by republishing its weather item, the way the
/// phone-side listener does. Failures can be injected for tests.
pub struct LoopbackTransport {
    weather_path: String,
    state: Mutex<LoopbackState>,
}

impl LoopbackTransport {
    pub fn new(weather_path: impl Into<String>) -> Self {
        Self {
            weather_path: weather_path.into(),
            state: Mutex::new(LoopbackState::default()),
        }
    }

    pub fn with_node(self, node: impl Into<String>) -> Self {
        self.add_node(NodeId::new(node));
        self
    }

    /// Republish the stored weather item whenever a refresh request arrives.
    pub fn respond_to_requests(self, enabled: bool) -> Self {
        self.lock().respond_to_requests = enabled;
        self
    }

    pub fn add_node(&self, node: NodeId) {
        let mut state = self.lock();
        if !state.nodes.contains(&node) {
            state.nodes.push(node);
        }
    }

    pub fn clear_nodes(&self) {
        self.lock().nodes.clear();
    }

    pub fn fail_next_connects(&self, count: u32) {
        self.lock().connect_failures_left = count;
    }

    pub fn set_send_failure(&self, failing: bool) {
        self.lock().fail_sends = failing;
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock().calls.clone()
    }

    /// Store `item` and notify subscribers (created or modified).
    pub fn put_item(&self, item: DataItem) {
        let mut state = self.lock();
        let kind = if state.items.contains_key(&item.path) {
            DataEventKind::Modified
        } else {
            DataEventKind::Created
        };
        state.items.insert(item.path.clone(), item.clone());
        broadcast(&mut state, vec![DataEvent { kind, item }]);
    }

    /// Store the weather item without notifying anyone.
    pub fn store_item(&self, item: DataItem) {
        self.lock().items.insert(item.path.clone(), item);
    }

    pub fn publish_weather(&self, snapshot: &WeatherSnapshot) {
        self.put_item(DataItem::new(self.weather_path.clone(), encode_weather(snapshot)));
    }

    pub fn delete_item(&self, path: &str) {
        let mut state = self.lock();
        if let Some(item) = state.items.remove(path) {
            broadcast(
                &mut state,
                vec![DataEvent {
                    kind: DataEventKind::Deleted,
                    item,
                }],
            );
        }
    }

    /// Deliver a hand-built notification batch as-is.
    pub fn push_events(&self, events: Vec<DataEvent>) {
        broadcast(&mut self.lock(), events);
    }

    /// Simulate the link dropping: listeners see their streams end.
    pub fn drop_link(&self) {
        let mut state = self.lock();
        state.connected = false;
        state.subscribers.clear();
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn broadcast(state: &mut LoopbackState, events: Vec<DataEvent>) {
    state.subscribers.retain(|id, sender| match sender.try_send(events.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("subscriber {:?} is not keeping up; dropping a batch", id);
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
}

impl CompanionTransport for LoopbackTransport {
    async fn connect(&self) -> Result<(), SyncError> {
        let mut state = self.lock();
        state.calls.push(TransportCall::Connect);
        if state.connect_failures_left > 0 {
            state.connect_failures_left -= 1;
            return Err(SyncError::Connect("companion unreachable".into()));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&self) {
        let mut state = self.lock();
        state.calls.push(TransportCall::Disconnect);
        state.connected = false;
        state.subscribers.clear();
    }

    async fn discover_nodes(&self) -> Result<Vec<NodeId>, SyncError> {
        let mut state = self.lock();
        state.calls.push(TransportCall::DiscoverNodes);
        if !state.connected {
            return Err(SyncError::NotConnected);
        }
        Ok(state.nodes.clone())
    }

    async fn send_message(&self, node: &NodeId, path: &str, payload: &[u8]) -> Result<(), SyncError> {
        let mut state = self.lock();
        state.calls.push(TransportCall::SendMessage {
            node: node.clone(),
            path: path.to_string(),
        });

        let failure = if !state.connected {
            Some("link down")
        } else if !state.nodes.contains(node) {
            Some("unknown node")
        } else if state.fail_sends {
            Some("node rejected message")
        } else {
            None
        };
        if let Some(reason) = failure {
            return Err(SyncError::Delivery {
                node: node.to_string(),
                path: path.to_string(),
                reason: reason.to_string(),
            });
        }

        debug!("loopback companion got {} byte message on {}", payload.len(), path);
        if path == self.weather_path && state.respond_to_requests {
            if let Some(item) = state.items.get(&self.weather_path).cloned() {
                broadcast(
                    &mut state,
                    vec![DataEvent {
                        kind: DataEventKind::Modified,
                        item,
                    }],
                );
            }
        }
        Ok(())
    }

    async fn fetch_data_items(&self) -> Result<Vec<DataItem>, SyncError> {
        let mut state = self.lock();
        state.calls.push(TransportCall::FetchDataItems);
        if !state.connected {
            return Err(SyncError::NotConnected);
        }
        Ok(state.items.values().cloned().collect())
    }

    async fn subscribe(&self) -> Result<Subscription, SyncError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(SyncError::NotConnected);
        }
        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        state.subscribers.insert(id, tx);
        state.calls.push(TransportCall::Subscribe(id));
        Ok(Subscription { id, events: rx })
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.lock();
        state.calls.push(TransportCall::Unsubscribe(id));
        state.subscribers.remove(&id);
    }
}
