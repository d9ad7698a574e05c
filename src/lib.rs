pub mod error;
pub mod face;
pub mod power;
pub mod settings;
pub mod sync;
pub mod tick;
pub mod utils;
pub mod weather;

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use rand::{seq::SliceRandom, Rng};
use tokio_util::sync::CancellationToken;

pub use error::{DecodeError, FaceError, SyncError};
pub use face::{FaceController, FaceFrame, FaceHost, RedrawSignal, Renderer};
pub use power::{PowerMode, PowerModeController};
pub use settings::{FaceSettings, SettingsStore};
pub use sync::{CompanionSyncClient, CompanionTransport, LoopbackTransport, SyncState};
pub use tick::{Clock, SystemClock, TickControl, TickScheduler};
pub use weather::{ConditionBucket, SnapshotReader, SnapshotStore, WeatherSnapshot};

const ENABLE_LOGS: bool = true;

const SETTINGS_ENV: &str = "WEATHERFACE_SETTINGS";
const DEBUG_ENV: &str = "WEATHERFACE_DEBUG";
const DEFAULT_SETTINGS_FILE: &str = "weatherface.json";
const DEMO_COMPANION_NODE: &str = "companion";
const DEMO_CONDITION_CODES: [i32; 10] = [800, 801, 802, 804, 300, 500, 511, 600, 741, 211];

/// Run the face against an in-process companion until ctrl-c.
pub fn run() -> Result<()> {
    utils::init_logging();

    log::info!("weatherface starting up...");

    let settings_path = env::var_os(SETTINGS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let settings = SettingsStore::new(settings_path)?.settings();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_face(settings))
}

async fn run_face(settings: FaceSettings) -> Result<()> {
    let debug = env::var(DEBUG_ENV).is_ok_and(|value| value == "1");
    let publish_every = if debug {
        Duration::from_secs(2)
    } else {
        Duration::from_secs(30)
    };

    let companion = Arc::new(
        LoopbackTransport::new(settings.weather_path.clone())
            .with_node(DEMO_COMPANION_NODE)
            .respond_to_requests(true),
    );
    companion.store_item(sync::DataItem::new(
        settings.weather_path.clone(),
        weather::encode_weather(&demo_weather()),
    ));

    let stop_publisher = CancellationToken::new();
    let publisher = tokio::spawn(publish_demo_weather(
        Arc::clone(&companion),
        publish_every,
        stop_publisher.clone(),
    ));

    let redraws = Arc::new(RedrawSignal::new());
    let mut face = FaceController::start(settings, Arc::clone(&companion), redraws.clone())?;
    face.on_properties_changed(false);
    face.on_visibility_changed(true);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("Failed to listen for ctrl-c")?;
                break;
            }
            _ = redraws.requested() => log_frame(&face.current_frame()),
        }
    }

    log::info!("weatherface shutting down...");
    stop_publisher.cancel();
    face.shutdown().await;
    publisher.await.context("Demo companion task failed")?;

    let stats = face.sync_stats();
    log::info!(
        "sync stats: {}",
        serde_json::to_string(&stats).unwrap_or_default()
    );
    Ok(())
}

fn log_frame(frame: &FaceFrame) {
    let seconds = frame
        .seconds
        .as_deref()
        .map(|s| format!(":{s}"))
        .unwrap_or_default();
    let meridiem = frame.meridiem.as_deref().unwrap_or("");
    crate::log_info!(
        "{}:{}{} {} | {} | {} / {} {}{}",
        frame.hour,
        frame.minute,
        seconds,
        meridiem,
        frame.date,
        frame.high,
        frame.low,
        frame.condition.as_str(),
        if frame.stale { " (stale)" } else { "" }
    );
}

async fn publish_demo_weather(
    companion: Arc<LoopbackTransport>,
    every: Duration,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    // The first tick completes immediately; the stored item covers it.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => companion.publish_weather(&demo_weather()),
        }
    }
}

fn demo_weather() -> WeatherSnapshot {
    let mut rng = rand::thread_rng();
    let high = rng.gen_range(8..=34) as f64;
    let low = high - rng.gen_range(4..=12) as f64;
    let code = DEMO_CONDITION_CODES.choose(&mut rng).copied().unwrap_or(800);
    WeatherSnapshot::new(high, low, code, Utc::now())
}
