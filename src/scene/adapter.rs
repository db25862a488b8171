use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::encoding::EncodedImage;
use crate::platform::{SceneBackend, ScriptHost};
use crate::settings::SceneSettings;

use super::loader::ScriptLoader;
use super::markup::SceneDescription;
use super::SceneError;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SceneStatus {
    Idle,
    Loading,
    Active,
}

struct SceneSlot {
    status: SceneStatus,
    cancel: CancellationToken,
}

/// Drives the external AR scene: load the library, wait for it to settle,
/// mount the category scene, take screenshots, tear down.
pub struct AFrameSceneAdapter {
    loader: Arc<ScriptLoader>,
    backend: Arc<dyn SceneBackend>,
    settle_delay: Duration,
    slot: Mutex<SceneSlot>,
}

impl AFrameSceneAdapter {
    pub fn new(
        loader: Arc<ScriptLoader>,
        backend: Arc<dyn SceneBackend>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            loader,
            backend,
            settle_delay,
            slot: Mutex::new(SceneSlot {
                status: SceneStatus::Idle,
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn from_settings(
        host: Arc<dyn ScriptHost>,
        backend: Arc<dyn SceneBackend>,
        settings: &SceneSettings,
    ) -> Self {
        let loader = ScriptLoader::new(host, settings.scripts.clone(), settings.script_timeout());
        Self::new(Arc::new(loader), backend, settings.settle_delay())
    }

    pub fn status(&self) -> SceneStatus {
        self.slot().status
    }

    pub fn loader(&self) -> &ScriptLoader {
        &self.loader
    }

    /// Load the scene scripts, let the library settle, then mount the scene
    /// for `category`. A `dispose()` at any point before the mount makes this
    /// return `Cancelled` without mounting anything.
    pub async fn initialize(&self, category: &str) -> Result<(), SceneError> {
        self.dispose();
        let token = {
            let mut slot = self.slot();
            let token = CancellationToken::new();
            slot.cancel = token.clone();
            slot.status = SceneStatus::Loading;
            token
        };

        let loaded = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(SceneError::Cancelled),
            loaded = self.loader.ensure_loaded() => loaded,
        };
        if let Err(err) = loaded {
            self.reset_if_current(&token);
            return Err(err);
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(SceneError::Cancelled),
            _ = tokio::time::sleep(self.settle_delay) => {}
        }

        let markup = SceneDescription::for_category(category).to_markup();
        let mut slot = self.slot();
        if token.is_cancelled() {
            return Err(SceneError::Cancelled);
        }
        if let Err(err) = self.backend.mount(&markup) {
            log_warn!("scene mount failed: {err}");
            slot.status = SceneStatus::Idle;
            return Err(err.into());
        }
        slot.status = SceneStatus::Active;
        log_info!("AR scene mounted for '{category}'");
        Ok(())
    }

    pub async fn capture_screenshot(&self) -> Result<EncodedImage, SceneError> {
        if self.status() != SceneStatus::Active {
            return Err(SceneError::NotReady);
        }
        Ok(self.backend.screenshot().await?)
    }

    /// Cancel any in-flight initialize and unmount the scene. Safe in any state.
    pub fn dispose(&self) {
        let mut slot = self.slot();
        slot.cancel.cancel();
        if slot.status == SceneStatus::Active {
            self.backend.unmount();
            log_info!("AR scene unmounted");
        }
        slot.status = SceneStatus::Idle;
    }

    fn reset_if_current(&self, token: &CancellationToken) {
        let mut slot = self.slot();
        if !token.is_cancelled() {
            slot.status = SceneStatus::Idle;
        }
    }

    fn slot(&self) -> MutexGuard<'_, SceneSlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for AFrameSceneAdapter {
    fn drop(&mut self) {
        self.dispose();
    }
}
