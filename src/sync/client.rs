use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::{
    runtime::Handle,
    sync::{watch, Mutex as AsyncMutex},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    error::FaceError,
    face::Renderer,
    tick::Clock,
    weather::{decode_weather, SnapshotStore},
};

use super::{
    backoff::ReconnectPolicy,
    stats::{SyncStats, SyncStatsSnapshot},
    transport::{CompanionTransport, DataEvent, DataEventKind, DataItem, SubscriptionId},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    Disconnected,
    Connecting,
    Connected,
}

/// Per-attempt link state. Rebuilt on every connect attempt.
#[derive(Debug, Default, Clone)]
pub struct SyncSession {
    pub connected: bool,
    pub pending_request_id: Option<Uuid>,
    pub subscription: Option<SubscriptionId>,
}

impl SyncSession {
    pub fn subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Path of both the refresh request and the weather data item.
    pub weather_path: String,
    pub reconnect: ReconnectPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            weather_path: "/wearable".to_string(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

struct SyncShared {
    store: SnapshotStore,
    renderer: Arc<dyn Renderer>,
    clock: Arc<dyn Clock>,
    stats: SyncStats,
    options: SyncOptions,
    state_tx: watch::Sender<SyncState>,
    /// Held by a session task from before its first connect until its
    /// teardown completes. A newer session waits here, so a stale
    /// `disconnect` can never land on its link.
    link: AsyncMutex<()>,
}

struct ActiveSession {
    token: CancellationToken,
    delivery_gate: Arc<Mutex<()>>,
    handle: JoinHandle<()>,
}

enum SessionEnd {
    Cancelled,
    LinkLost,
}

/// Keeps the weather snapshot fed from the companion device.
///
/// Each `connect` starts one session task that connects, subscribes to
/// data-changed pushes, asks every reachable node for a refresh and fetches
/// stored items once a request is acknowledged. Errors stay inside the
/// session; the only visible effects are snapshot replacements and the
/// redraw that follows each one.
pub struct CompanionSyncClient<T: CompanionTransport> {
    runtime: Handle,
    transport: Arc<T>,
    shared: Arc<SyncShared>,
    active: Option<ActiveSession>,
    draining: Vec<JoinHandle<()>>,
}

impl<T: CompanionTransport> CompanionSyncClient<T> {
    pub fn new(
        transport: Arc<T>,
        store: SnapshotStore,
        renderer: Arc<dyn Renderer>,
        clock: Arc<dyn Clock>,
        options: SyncOptions,
    ) -> Result<Self, FaceError> {
        let runtime = Handle::try_current()
            .map_err(|err| FaceError::SchedulerUnavailable(err.to_string()))?;
        let (state_tx, _) = watch::channel(SyncState::Disconnected);

        Ok(Self {
            runtime,
            transport,
            shared: Arc::new(SyncShared {
                store,
                renderer,
                clock,
                stats: SyncStats::new(),
                options,
                state_tx,
                link: AsyncMutex::new(()),
            }),
            active: None,
            draining: Vec::new(),
        })
    }

    pub fn state(&self) -> SyncState {
        *self.shared.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.shared.state_tx.subscribe()
    }

    pub fn stats(&self) -> SyncStatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Whether a session task is still trying to reach, or serving, the link.
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    /// Start a session unless one is already running. Never blocks.
    pub fn connect(&mut self) {
        if self.is_active() {
            log_debug!("companion session already active");
            return;
        }
        if let Some(finished) = self.active.take() {
            self.draining.push(finished.handle);
        }
        self.draining.retain(|handle| !handle.is_finished());

        let token = CancellationToken::new();
        let delivery_gate = Arc::new(Mutex::new(()));
        let task = SessionTask {
            transport: Arc::clone(&self.transport),
            shared: Arc::clone(&self.shared),
            token: token.clone(),
            delivery_gate: Arc::clone(&delivery_gate),
        };

        let handle = self.runtime.spawn(task.run());
        self.active = Some(ActiveSession {
            token,
            delivery_gate,
            handle,
        });
    }

    /// Stop the session. Once this returns no further snapshot replacement or
    /// redraw comes from it; the listener is unregistered and the link
    /// released by the session task in that order.
    pub fn disconnect(&mut self) {
        let Some(session) = self.active.take() else {
            return;
        };

        {
            let _gate = lock(&session.delivery_gate);
            session.token.cancel();
            self.shared.state_tx.send_replace(SyncState::Disconnected);
        }
        log_info!("companion session stopped");
        self.draining.push(session.handle);
    }

    /// `disconnect`, then wait for every session task to finish its teardown.
    pub async fn shutdown(&mut self) {
        self.disconnect();
        for handle in self.draining.drain(..) {
            if let Err(err) = handle.await {
                log_error!("companion session task failed: {err}");
            }
        }
    }
}

impl<T: CompanionTransport> Drop for CompanionSyncClient<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

struct SessionTask<T: CompanionTransport> {
    transport: Arc<T>,
    shared: Arc<SyncShared>,
    token: CancellationToken,
    delivery_gate: Arc<Mutex<()>>,
}

impl<T: CompanionTransport> SessionTask<T> {
    async fn run(self) {
        let Some(_link) = self.cancellable(self.shared.link.lock()).await else {
            return;
        };
        let mut failures: u32 = 0;

        loop {
            self.publish(SyncState::Connecting);
            let mut session = SyncSession::default();

            match self.cancellable(self.transport.connect()).await {
                None => break,
                Some(Ok(())) => {
                    session.connected = true;
                    failures = 0;
                    self.publish(SyncState::Connected);
                    log_info!("companion link connected");

                    let end = self.serve(&mut session).await;
                    self.teardown(&mut session).await;

                    match end {
                        SessionEnd::Cancelled => break,
                        SessionEnd::LinkLost => {
                            log_warn!("companion link lost");
                            failures += 1;
                        }
                    }
                }
                Some(Err(err)) => {
                    self.shared.stats.record_connect_failure();
                    failures += 1;
                    log_warn!("companion connect attempt {failures} failed: {err}");
                }
            }

            self.publish(SyncState::Disconnected);

            let delay = self
                .shared
                .options
                .reconnect
                .delay_for(failures, &mut rand::thread_rng());
            let Some(delay) = delay else {
                log_info!("companion unreachable; waiting for the face to become visible again");
                break;
            };

            log_debug!("retrying companion link in {}ms", delay.as_millis());
            if self.cancellable(time::sleep(delay)).await.is_none() {
                break;
            }
        }

        self.publish(SyncState::Disconnected);
    }

    async fn serve(&self, session: &mut SyncSession) -> SessionEnd {
        let mut subscription = match self.cancellable(self.transport.subscribe()).await {
            None => return SessionEnd::Cancelled,
            Some(Ok(subscription)) => subscription,
            Some(Err(err)) => {
                log_warn!("could not register data listener: {err}");
                return SessionEnd::LinkLost;
            }
        };
        session.subscription = Some(subscription.id);

        if self.request_refresh(session).await.is_none() {
            return SessionEnd::Cancelled;
        }

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return SessionEnd::Cancelled,
                batch = subscription.events.recv() => match batch {
                    Some(events) => self.handle_events(events),
                    None => return SessionEnd::LinkLost,
                },
            }
        }
    }

    /// Ask every reachable node to publish fresh weather. `None` on cancel.
    async fn request_refresh(&self, session: &mut SyncSession) -> Option<()> {
        let nodes = match self.cancellable(self.transport.discover_nodes()).await? {
            Ok(nodes) => nodes,
            Err(err) => {
                log_warn!("node discovery failed: {err}");
                return Some(());
            }
        };

        if nodes.is_empty() {
            log_info!("no companion node reachable; will retry on next connect");
            return Some(());
        }

        let path = self.shared.options.weather_path.as_str();
        for node in nodes {
            let request_id = Uuid::new_v4();
            session.pending_request_id = Some(request_id);
            log_debug!("refresh request {request_id} -> {node}");

            let sent = self
                .cancellable(self.transport.send_message(&node, path, &[]))
                .await?;
            session.pending_request_id = None;

            match sent {
                Ok(()) => {
                    self.shared.stats.record_request_sent();
                    log_debug!("refresh request {request_id} delivered");
                    match self.cancellable(self.transport.fetch_data_items()).await? {
                        Ok(items) => self.apply_items(items),
                        Err(err) => log_warn!("fetching stored items failed: {err}"),
                    }
                }
                Err(err) => {
                    self.shared.stats.record_send_failure();
                    log_warn!("refresh request {request_id} failed: {err}");
                }
            }
        }

        Some(())
    }

    async fn teardown(&self, session: &mut SyncSession) {
        if let Some(id) = session.subscription.take() {
            self.transport.unsubscribe(id).await;
        }
        self.transport.disconnect().await;
        session.connected = false;
        session.pending_request_id = None;
    }

    fn handle_events(&self, events: Vec<DataEvent>) {
        log_debug!("data changed: {} events", events.len());
        for event in events {
            if event.kind != DataEventKind::Modified {
                log_debug!("ignoring {:?} event for {}", event.kind, event.item.path);
                self.shared.stats.record_ignored();
                continue;
            }
            self.apply_item(event.item);
        }
    }

    fn apply_items(&self, items: Vec<DataItem>) {
        for item in items {
            self.apply_item(item);
        }
    }

    fn apply_item(&self, item: DataItem) {
        let shared = &self.shared;
        if item.path != shared.options.weather_path {
            log_debug!("ignoring data item at {}", item.path);
            shared.stats.record_ignored();
            return;
        }

        let snapshot = match decode_weather(&item.data, shared.clock.now()) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                shared.stats.record_malformed();
                log_warn!("discarding weather record: {err}");
                return;
            }
        };

        let _gate = lock(&self.delivery_gate);
        if self.token.is_cancelled() {
            return;
        }
        log_debug!(
            "weather updated: high {} low {} code {}",
            snapshot.high_temperature,
            snapshot.low_temperature,
            snapshot.condition_code
        );
        shared.store.replace(snapshot);
        shared.stats.record_update();
        shared.renderer.request_redraw();
    }

    fn publish(&self, state: SyncState) {
        let _gate = lock(&self.delivery_gate);
        if !self.token.is_cancelled() {
            self.shared.state_tx.send_replace(state);
        }
    }

    async fn cancellable<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

fn lock(gate: &Mutex<()>) -> MutexGuard<'_, ()> {
    match gate.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
