pub mod camera;
pub mod capability;
pub mod capture;
pub mod detection;
pub mod encoding;
pub mod error;
pub mod location;
pub mod overlay;
pub mod platform;
pub mod scene;
pub mod settings;
mod utils;

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use log::{info, warn};

use capture::{CapturePayload, CaptureCoordinator, CaptureRequest, ReportIntake};
use detection::MockDetector;
use platform::simulated::{SimulatedPlatform, SimulatedScene, SimulatedScriptHost};
use scene::AFrameSceneAdapter;
use settings::SettingsStore;

pub use error::{CaptureError, CaptureResult};

const SETTINGS_ENV_VAR: &str = "CIVICSNAP_SETTINGS";
const DEMO_CATEGORY: &str = "pothole";
const DETECTION_WAIT: Duration = Duration::from_secs(30);

/// Logs what the report form would receive.
struct LoggingIntake;

impl ReportIntake for LoggingIntake {
    fn on_capture(&self, payload: CapturePayload) {
        let location = payload
            .location()
            .map(|fix| fix.formatted())
            .unwrap_or_else(|| "no location".into());
        info!(
            "report received: category={} confidence={}% location={} image={} chars",
            payload.category(),
            payload.confidence_percent(),
            location,
            payload.image_data().len()
        );
    }

    fn on_close(&self) {
        info!("capture view closed by user");
    }
}

fn settings_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os(SETTINGS_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    let dir = env::temp_dir().join("civicsnap");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create settings directory {}", dir.display()))?;
    Ok(dir.join("settings.json"))
}

/// Demo: open a capture view on the simulated device, wait for a confident
/// detection, capture once, then exercise the scene front-end.
pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("civicsnap starting up...");

    let store = SettingsStore::new(settings_path()?)?;
    let settings = store.effective();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(async move {
        let device = SimulatedPlatform::new();
        let capabilities = capability::probe(&device.platform()).await;
        info!("device capabilities: {capabilities:?}");
        if !capabilities.supports_ar_capture() {
            warn!("AR capture unsupported on this device; falling back to the standard form");
            return Ok(());
        }

        let threshold = settings.detection.confidence_threshold;
        let mut view = CaptureCoordinator::open(
            device.platform(),
            CaptureRequest::from_settings(DEMO_CATEGORY, &settings),
            Arc::new(LoggingIntake),
            settings.clone(),
            Box::new(MockDetector::new()),
        )
        .await?;

        let mut detections = view.subscribe_detection();
        let waited = tokio::time::timeout(DETECTION_WAIT, async {
            detections
                .wait_for(|state| state.confident_label(threshold).is_some())
                .await
                .map(|_| ())
        })
        .await;
        match waited {
            Ok(Ok(())) => info!("HUD: {:?}", view.hud()),
            Ok(Err(_)) => return Err(anyhow!("detection worker stopped unexpectedly")),
            Err(_) => warn!("no confident detection; capturing with the selected category"),
        }

        let payload = view.capture().context("Capture failed")?;
        info!("captured {} at {}%", payload.category(), payload.confidence_percent());
        view.close().await;

        let scene = AFrameSceneAdapter::from_settings(
            Arc::new(SimulatedScriptHost::new()),
            Arc::new(SimulatedScene::new()),
            &settings.scene,
        );
        scene.initialize(DEMO_CATEGORY).await?;
        let screenshot = scene.capture_screenshot().await?;
        info!("scene screenshot: {} bytes", screenshot.bytes.len());
        scene.dispose();

        Ok(())
    })
}
