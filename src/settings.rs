use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::sync::{ReconnectPolicy, SyncOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaceSettings {
    pub tick_interval_ms: u64,
    pub weather_path: String,
    pub use_24_hour: bool,
    /// Snapshots older than this are drawn as stale. `None` never marks them.
    pub stale_after_minutes: Option<u32>,
    pub reconnect: ReconnectPolicy,
}

impl Default for FaceSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            weather_path: "/wearable".into(),
            use_24_hour: false,
            stale_after_minutes: Some(360),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl FaceSettings {
    pub fn stale_after(&self) -> Option<chrono::Duration> {
        self.stale_after_minutes
            .map(|minutes| chrono::Duration::minutes(i64::from(minutes)))
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            weather_path: self.weather_path.clone(),
            reconnect: self.reconnect.clone(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<FaceSettings>,
}

impl SettingsStore {
    /// Missing file: defaults. Unparseable file: defaults, with a warning.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings in {}: {}; using defaults",
                    path.display(),
                    err
                );
                FaceSettings::default()
            })
        } else {
            FaceSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> FaceSettings {
        self.read().clone()
    }

    pub fn update(&self, settings: FaceSettings) -> Result<()> {
        let mut guard = self.write();
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: FaceSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid settings in {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &FaceSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, FaceSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, FaceSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
