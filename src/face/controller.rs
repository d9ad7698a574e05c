use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use tokio::sync::watch;

use crate::{
    error::FaceError,
    power::{PowerMode, PowerModeController},
    settings::FaceSettings,
    sync::{CompanionSyncClient, CompanionTransport, SyncState, SyncStatsSnapshot},
    tick::{Clock, SystemClock, TickControl, TickScheduler},
    weather::{SnapshotReader, SnapshotStore, WeatherSnapshot},
};

use super::{
    frame::{FaceFrame, FrameContext},
    host::FaceHost,
    render::Renderer,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Wires host lifecycle events to the tick scheduler, the power state
/// machine and the companion sync client.
///
/// Owns the write side of the weather cell; the sync client holds a clone
/// and the renderer only ever sees a [`SnapshotReader`].
pub struct FaceController<T: CompanionTransport> {
    settings: FaceSettings,
    clock: Arc<dyn Clock>,
    renderer: Arc<dyn Renderer>,
    store: SnapshotStore,
    power: PowerModeController,
    ticks: TickScheduler,
    sync: CompanionSyncClient<T>,
}

impl<T: CompanionTransport> FaceController<T> {
    /// Build the face. Nothing ticks and nothing connects until the host
    /// reports the face visible.
    pub fn start(
        settings: FaceSettings,
        transport: Arc<T>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, FaceError> {
        Self::start_with_clock(settings, transport, renderer, Arc::new(SystemClock))
    }

    pub fn start_with_clock(
        settings: FaceSettings,
        transport: Arc<T>,
        renderer: Arc<dyn Renderer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FaceError> {
        let store = SnapshotStore::new(WeatherSnapshot::default());
        let ticks = TickScheduler::new(
            settings.tick_interval_ms,
            Arc::clone(&clock),
            Arc::clone(&renderer),
        )?;
        let sync = CompanionSyncClient::new(
            transport,
            store.clone(),
            Arc::clone(&renderer),
            Arc::clone(&clock),
            settings.sync_options(),
        )?;

        log_info!(
            "face started: tick every {}ms, weather on {}",
            settings.tick_interval_ms,
            settings.weather_path
        );

        Ok(Self {
            settings,
            clock,
            renderer,
            store,
            power: PowerModeController::new(),
            ticks,
            sync,
        })
    }

    pub fn settings(&self) -> &FaceSettings {
        &self.settings
    }

    pub fn reader(&self) -> SnapshotReader {
        self.store.reader()
    }

    pub fn power_mode(&self) -> PowerMode {
        self.power.mode()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticks.is_armed()
    }

    pub fn fired_ticks(&self) -> u64 {
        self.ticks.fired_ticks()
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn watch_sync_state(&self) -> watch::Receiver<SyncState> {
        self.sync.watch_state()
    }

    pub fn sync_stats(&self) -> SyncStatsSnapshot {
        self.sync.stats()
    }

    /// Host display properties; only affects anti-aliasing in ambient mode.
    pub fn on_properties_changed(&mut self, low_bit_ambient: bool) {
        self.power.on_properties_changed(low_bit_ambient);
    }

    /// Synchronous teardown: no tick and no weather delivery after return.
    pub fn stop(&mut self) {
        self.ticks.disarm();
        self.sync.disconnect();
        log_info!("face stopped");
    }

    /// `stop`, then wait for the sync session to release the link.
    pub async fn shutdown(&mut self) {
        self.ticks.disarm();
        self.sync.shutdown().await;
        log_info!("face shut down");
    }

    fn compose(&self, now: DateTime<Utc>, local: NaiveDateTime) -> FaceFrame {
        let snapshot = self.store.read_shared();
        let stale = self
            .settings
            .stale_after()
            .is_some_and(|max_age| snapshot.is_stale(now, max_age));

        FaceFrame::compose(
            local,
            &snapshot,
            FrameContext {
                mode: self.power.mode(),
                low_bit_rendering: self.power.low_bit_rendering(),
                use_24_hour: self.settings.use_24_hour,
                stale,
            },
        )
    }

    /// Frame for the clock's current time.
    pub fn current_frame(&self) -> FaceFrame {
        self.on_draw(self.clock.now())
    }
}

impl<T: CompanionTransport> FaceHost for FaceController<T> {
    fn on_visibility_changed(&mut self, visible: bool) {
        log_debug!("visibility -> {visible}");
        if visible {
            self.sync.connect();
        }
        self.power
            .on_visibility_changed(visible, &mut self.ticks, self.renderer.as_ref());
        if !visible {
            self.sync.disconnect();
        }
    }

    fn on_ambient_mode_changed(&mut self, ambient: bool) {
        log_debug!("ambient -> {ambient}");
        self.power
            .on_ambient_changed(ambient, &mut self.ticks, self.renderer.as_ref());
    }

    fn on_time_tick(&mut self) {
        self.renderer.request_redraw();
    }

    fn on_draw(&self, now: DateTime<Utc>) -> FaceFrame {
        self.compose(now, now.with_timezone(&Local).naive_local())
    }

    fn on_stop(&mut self) {
        self.stop();
    }
}

impl<T: CompanionTransport> Drop for FaceController<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        face::RedrawSignal,
        sync::{LoopbackTransport, ReconnectPolicy, TransportCall},
        tick::AnchoredClock,
    };
    use std::time::Duration;
    use tokio::time;

    const EPOCH: i64 = 1_700_000_000_250;

    struct Harness {
        face: FaceController<LoopbackTransport>,
        transport: Arc<LoopbackTransport>,
        redraws: Arc<RedrawSignal>,
        clock: AnchoredClock,
    }

    fn harness() -> Harness {
        let transport = Arc::new(LoopbackTransport::new("/wearable").with_node("phone"));
        let redraws = Arc::new(RedrawSignal::new());
        let clock = AnchoredClock::new(EPOCH);
        let settings = FaceSettings {
            reconnect: ReconnectPolicy::host_driven(),
            ..FaceSettings::default()
        };
        let face = FaceController::start_with_clock(
            settings,
            Arc::clone(&transport),
            redraws.clone(),
            Arc::new(clock),
        )
        .unwrap();
        Harness {
            face,
            transport,
            redraws,
            clock,
        }
    }

    async fn eventually(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn start_without_runtime_is_fatal() {
        let result = FaceController::start(
            FaceSettings::default(),
            Arc::new(LoopbackTransport::new("/wearable")),
            Arc::new(RedrawSignal::new()),
        );
        assert!(matches!(result, Err(FaceError::SchedulerUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idle_until_visible() {
        let h = harness();
        time::sleep(Duration::from_secs(3)).await;

        assert!(!h.face.is_ticking());
        assert_eq!(h.face.power_mode(), PowerMode::Hidden);
        assert_eq!(h.face.sync_state(), SyncState::Disconnected);
        assert!(h.transport.calls().is_empty());
        assert_eq!(h.redraws.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn becoming_visible_redraws_ticks_and_connects() {
        let mut h = harness();
        h.face.on_visibility_changed(true);
        assert_eq!(h.redraws.count(), 1);
        assert!(h.face.is_ticking());

        time::sleep(Duration::from_millis(3_800)).await;
        assert_eq!(h.face.fired_ticks(), 4);
        assert_eq!(h.face.sync_state(), SyncState::Connected);
        assert!(h.transport.calls().contains(&TransportCall::Connect));
    }

    #[tokio::test(start_paused = true)]
    async fn ambient_stops_ticks_with_one_redraw() {
        let mut h = harness();
        h.face.on_visibility_changed(true);
        h.face.on_ambient_mode_changed(true);

        assert_eq!(h.redraws.count(), 2);
        assert!(!h.face.is_ticking());
        assert_eq!(h.face.power_mode(), PowerMode::Ambient);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.face.fired_ticks(), 0);

        h.face.on_ambient_mode_changed(false);
        assert_eq!(h.redraws.count(), 3);
        assert!(h.face.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn hiding_disarms_and_disconnects() {
        let mut h = harness();
        h.face.on_visibility_changed(true);
        eventually(|| h.transport.subscriber_count() == 1).await;

        h.face.on_visibility_changed(false);
        assert!(!h.face.is_ticking());
        assert_eq!(h.face.sync_state(), SyncState::Disconnected);

        let fired = h.face.fired_ticks();
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.face.fired_ticks(), fired);
        eventually(|| h.transport.calls().last() == Some(&TransportCall::Disconnect)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn minute_tick_redraws_once_in_every_mode() {
        let mut h = harness();
        h.face.on_time_tick();
        assert_eq!(h.redraws.count(), 1);

        h.face.on_ambient_mode_changed(true);
        h.face.on_time_tick();
        assert_eq!(h.redraws.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pushed_weather_reaches_the_reader() {
        let mut h = harness();
        let reader = h.face.reader();
        h.face.on_visibility_changed(true);
        h.face.on_ambient_mode_changed(true);
        eventually(|| h.transport.subscriber_count() == 1).await;

        let observed = h.clock.now();
        h.transport
            .publish_weather(&WeatherSnapshot::new(19.0, 8.0, 802, observed));
        h.transport
            .publish_weather(&WeatherSnapshot::new(19.0, 8.0, 802, observed));
        eventually(|| h.face.sync_stats().updates_applied == 1).await;

        assert_eq!(reader.read().condition_code, 802);
        assert_eq!(h.redraws.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn frames_flag_stale_weather() {
        let mut h = harness();
        h.face.on_properties_changed(true);

        let frame = h.face.current_frame();
        assert!(frame.stale);
        assert_eq!(frame.high, "-22°");

        h.face.on_visibility_changed(true);
        h.face.on_ambient_mode_changed(true);
        eventually(|| h.transport.subscriber_count() == 1).await;
        let observed = h.clock.now();
        h.transport
            .push_events(vec![crate::sync::DataEvent {
                kind: crate::sync::DataEventKind::Modified,
                item: crate::sync::DataItem::new(
                    "/wearable",
                    crate::weather::encode_weather(&WeatherSnapshot::new(
                        31.0, 20.0, 800, observed,
                    )),
                ),
            }]);
        eventually(|| h.face.sync_stats().updates_applied == 1).await;

        let frame = h.face.current_frame();
        assert!(!frame.stale);
        assert_eq!(frame.high, "31°");
        assert!(frame.ambient);
        assert!(!frame.anti_alias);
        assert_eq!(frame.seconds, None);

        let later = h.clock.now() + chrono::Duration::hours(7);
        assert!(h.face.on_draw(later).stale);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_everything() {
        let mut h = harness();
        h.face.on_visibility_changed(true);
        eventually(|| h.transport.subscriber_count() == 1).await;

        h.face.shutdown().await;

        assert!(!h.face.is_ticking());
        assert!(!h.transport.is_connected());
        let calls = h.transport.calls();
        let n = calls.len();
        assert!(matches!(calls[n - 2], TransportCall::Unsubscribe(_)));
        assert_eq!(calls[n - 1], TransportCall::Disconnect);
    }

    #[tokio::test(start_paused = true)]
    async fn host_stop_silences_ticks_and_sync() {
        let mut h = harness();
        h.face.on_visibility_changed(true);
        eventually(|| h.transport.subscriber_count() == 1).await;

        h.face.on_stop();
        assert!(!h.face.is_ticking());
        assert_eq!(h.face.sync_state(), SyncState::Disconnected);

        let redraws = h.redraws.count();
        h.transport
            .publish_weather(&WeatherSnapshot::new(12.0, 2.0, 600, h.clock.now()));
        h.transport
            .publish_weather(&WeatherSnapshot::new(12.0, 2.0, 600, h.clock.now()));
        time::sleep(Duration::from_secs(3)).await;

        assert_eq!(h.redraws.count(), redraws);
        assert!(h.face.reader().read().is_placeholder());
        eventually(|| h.transport.calls().last() == Some(&TransportCall::Disconnect)).await;
    }
}
