use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::platform::ScriptHost;

use super::SceneError;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
    Failed(SceneError),
}

/// Loads the scene library scripts exactly once per document.
///
/// Concurrent callers share a single load; scripts already present in the
/// document are never injected again. A failed load may be retried.
pub struct ScriptLoader {
    host: Arc<dyn ScriptHost>,
    scripts: Vec<String>,
    timeout: Duration,
    state: watch::Sender<LoadState>,
}

/// Puts an abandoned load back to `Unloaded` so a later call can claim it.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<LoadState>,
    finished: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.send_if_modified(|state| {
                if *state == LoadState::Loading {
                    *state = LoadState::Unloaded;
                    true
                } else {
                    false
                }
            });
        }
    }
}

impl ScriptLoader {
    pub fn new(host: Arc<dyn ScriptHost>, scripts: Vec<String>, timeout: Duration) -> Self {
        let (state, _) = watch::channel(LoadState::Unloaded);
        Self {
            host,
            scripts,
            timeout,
            state,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state.subscribe()
    }

    pub async fn ensure_loaded(&self) -> Result<(), SceneError> {
        loop {
            if self.try_claim() {
                return self.run_load().await;
            }

            let mut rx = self.state.subscribe();
            let settled = rx
                .wait_for(|state| *state != LoadState::Loading)
                .await
                .map_err(|_| SceneError::Cancelled)?
                .clone();
            match settled {
                LoadState::Ready => return Ok(()),
                LoadState::Failed(err) => return Err(err),
                // The loading caller gave up; try to take over.
                LoadState::Unloaded | LoadState::Loading => continue,
            }
        }
    }

    fn try_claim(&self) -> bool {
        let mut claimed = false;
        self.state.send_if_modified(|state| match state {
            LoadState::Unloaded | LoadState::Failed(_) => {
                *state = LoadState::Loading;
                claimed = true;
                true
            }
            LoadState::Loading | LoadState::Ready => false,
        });
        claimed
    }

    async fn run_load(&self) -> Result<(), SceneError> {
        let mut guard = LoadingGuard {
            state: &self.state,
            finished: false,
        };
        let result = self.load_all().await;
        guard.finished = true;
        self.state.send_replace(match &result {
            Ok(()) => LoadState::Ready,
            Err(err) => LoadState::Failed(err.clone()),
        });
        result
    }

    async fn load_all(&self) -> Result<(), SceneError> {
        for src in &self.scripts {
            if self.host.is_injected(src) {
                log_debug!("script already present: {src}");
                continue;
            }

            log_info!("loading script {src}");
            match tokio::time::timeout(self.timeout, self.host.inject(src)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    log_warn!("script {src} failed to load: {}", err.reason);
                    return Err(SceneError::ScriptLoad {
                        src: src.clone(),
                        reason: err.reason,
                    });
                }
                Err(_) => {
                    log_warn!("script {src} timed out after {}ms", self.timeout.as_millis());
                    return Err(SceneError::ScriptTimeout {
                        src: src.clone(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::simulated::SimulatedScriptHost;

    const A: &str = "https://cdn.example/a.js";
    const B: &str = "https://cdn.example/b.js";

    fn loader(host: &Arc<SimulatedScriptHost>, timeout: Duration) -> ScriptLoader {
        ScriptLoader::new(host.clone(), vec![A.into(), B.into()], timeout)
    }

    #[tokio::test]
    async fn loads_once_and_is_idempotent() {
        let host = Arc::new(SimulatedScriptHost::new());
        let loader = loader(&host, Duration::from_secs(15));

        loader.ensure_loaded().await.unwrap();
        loader.ensure_loaded().await.unwrap();
        assert_eq!(loader.state(), LoadState::Ready);
        assert_eq!(host.injections(), vec![A.to_string(), B.to_string()]);
    }

    #[tokio::test]
    async fn skips_scripts_already_in_document() {
        let host = Arc::new(SimulatedScriptHost::new());
        host.preload(A);
        let loader = loader(&host, Duration::from_secs(15));

        loader.ensure_loaded().await.unwrap();
        assert_eq!(host.injections(), vec![B.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_load() {
        let host = Arc::new(SimulatedScriptHost::new());
        host.set_load_delay(Duration::from_millis(300));
        let loader = loader(&host, Duration::from_secs(15));

        let (first, second) = tokio::join!(loader.ensure_loaded(), loader.ensure_loaded());
        first.unwrap();
        second.unwrap();
        assert_eq!(host.injections().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_script_times_out_to_failed() {
        let host = Arc::new(SimulatedScriptHost::new());
        host.hang_on(B);
        let loader = loader(&host, Duration::from_secs(15));

        let err = loader.ensure_loaded().await.unwrap_err();
        assert_eq!(
            err,
            SceneError::ScriptTimeout {
                src: B.into(),
                timeout_ms: 15_000
            }
        );
        assert!(matches!(loader.state(), LoadState::Failed(_)));
    }

    #[tokio::test]
    async fn failed_load_can_be_retried() {
        let host = Arc::new(SimulatedScriptHost::new());
        host.fail_on(A);
        let loader = loader(&host, Duration::from_secs(15));

        assert!(matches!(
            loader.ensure_loaded().await,
            Err(SceneError::ScriptLoad { .. })
        ));
        assert!(matches!(loader.state(), LoadState::Failed(_)));

        // A second attempt goes back to the host instead of replaying the failure.
        assert!(loader.ensure_loaded().await.is_err());
        assert_eq!(host.injections(), vec![A.to_string(), A.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_load_returns_to_unloaded() {
        let host = Arc::new(SimulatedScriptHost::new());
        host.set_load_delay(Duration::from_secs(5));
        let loader = loader(&host, Duration::from_secs(15));

        let attempt = tokio::time::timeout(Duration::from_secs(1), loader.ensure_loaded()).await;
        assert!(attempt.is_err());
        assert_eq!(loader.state(), LoadState::Unloaded);

        loader.ensure_loaded().await.unwrap();
        assert_eq!(loader.state(), LoadState::Ready);
    }
}
