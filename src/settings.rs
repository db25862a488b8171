use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::detection::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::location::TrackOptions;
use crate::platform::{FacingMode, PositionOptions, Resolution};

/// Set to `1` or `true` to run detection on a short interval.
pub const DEBUG_ENV_VAR: &str = "CIVICSNAP_DEBUG";
const DEBUG_DETECTION_INTERVAL_MS: u64 = 500;

pub const AFRAME_SCRIPT: &str =
    "https://cdn.jsdelivr.net/npm/aframe@1.4.0/dist/aframe-master.min.js";
pub const ARJS_SCRIPT: &str =
    "https://cdn.jsdelivr.net/npm/ar.js@2.2.2/aframe/build/aframe-ar.min.js";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraSettings {
    pub facing: FacingMode,
    pub resolution: Resolution,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            resolution: Resolution::HD,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionSettings {
    pub interval_ms: u64,
    pub confidence_threshold: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl DetectionSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationSettings {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub max_age_ms: u64,
    pub continuous: bool,
}

impl Default for LocationSettings {
    fn default() -> Self {
        let position = PositionOptions::default();
        Self {
            high_accuracy: position.high_accuracy,
            timeout_ms: position.timeout_ms,
            max_age_ms: position.max_age_ms,
            continuous: false,
        }
    }
}

impl LocationSettings {
    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            high_accuracy: self.high_accuracy,
            timeout_ms: self.timeout_ms,
            max_age_ms: self.max_age_ms,
        }
    }

    pub fn track_options(&self) -> TrackOptions {
        TrackOptions {
            position: self.position_options(),
            continuous: self.continuous,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputSettings {
    pub jpeg_quality: u8,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self { jpeg_quality: 80 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneSettings {
    /// Loaded in order.
    pub scripts: Vec<String>,
    pub script_timeout_ms: u64,
    pub settle_delay_ms: u64,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            scripts: vec![AFRAME_SCRIPT.into(), ARJS_SCRIPT.into()],
            script_timeout_ms: 15_000,
            settle_delay_ms: 1_000,
        }
    }
}

impl SceneSettings {
    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureSettings {
    pub camera: CameraSettings,
    pub detection: DetectionSettings,
    pub location: LocationSettings,
    pub capture: OutputSettings,
    pub scene: SceneSettings,
}

impl CaptureSettings {
    pub fn with_debug_overrides(mut self, debug: bool) -> Self {
        if debug {
            self.detection.interval_ms =
                self.detection.interval_ms.min(DEBUG_DETECTION_INTERVAL_MS);
        }
        self
    }
}

pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV_VAR)
        .map(|value| matches!(value.trim(), "1" | "true"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<CaptureSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            CaptureSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Stored settings with `CIVICSNAP_DEBUG` applied.
    pub fn effective(&self) -> CaptureSettings {
        self.get().with_debug_overrides(debug_enabled())
    }

    pub fn get(&self) -> CaptureSettings {
        self.read().clone()
    }

    pub fn update_camera(&self, camera: CameraSettings) -> Result<()> {
        let mut guard = self.write();
        guard.camera = camera;
        self.persist(&guard)
    }

    fn persist(&self, data: &CaptureSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, CaptureSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CaptureSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
