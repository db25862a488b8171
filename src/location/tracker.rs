use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::platform::{Geolocation, GeolocationError, PositionOptions};

use super::GeoFix;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const MIN_RESAMPLE_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackOptions {
    #[serde(flatten)]
    pub position: PositionOptions,
    /// Keep sampling after the first fix.
    pub continuous: bool,
}

/// Latest-fix geolocation sampler.
///
/// Fixes overwrite each other; failures are published on a separate channel
/// and never stop a capture. A request that outlives its timeout ends tracking
/// for the session.
pub struct LocationTracker {
    geolocation: Option<Arc<dyn Geolocation>>,
    fix_tx: Arc<watch::Sender<Option<GeoFix>>>,
    error_tx: Arc<watch::Sender<Option<GeolocationError>>>,
}

impl LocationTracker {
    pub fn new(geolocation: Option<Arc<dyn Geolocation>>) -> Self {
        let (fix_tx, _) = watch::channel(None);
        let (error_tx, _) = watch::channel(None);
        Self {
            geolocation,
            fix_tx: Arc::new(fix_tx),
            error_tx: Arc::new(error_tx),
        }
    }

    pub fn latest(&self) -> Option<GeoFix> {
        *self.fix_tx.borrow()
    }

    pub fn last_error(&self) -> Option<GeolocationError> {
        *self.error_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<GeoFix>> {
        self.fix_tx.subscribe()
    }

    pub fn subscribe_errors(&self) -> watch::Receiver<Option<GeolocationError>> {
        self.error_tx.subscribe()
    }

    /// Publish a failure without asking the device, e.g. when permission is
    /// already known to be denied.
    pub fn report_error(&self, err: GeolocationError) {
        log_warn!("location unavailable: {err}");
        self.error_tx.send_replace(Some(err));
    }

    pub fn track<F>(&self, on_fix: F, options: TrackOptions) -> TrackHandle
    where
        F: FnMut(GeoFix) + Send + 'static,
    {
        let token = CancellationToken::new();
        let Some(geolocation) = self.geolocation.clone() else {
            log_warn!("geolocation unavailable; captures will carry no location");
            self.error_tx
                .send_replace(Some(GeolocationError::PositionUnavailable));
            return TrackHandle { token, task: None };
        };

        let task = tokio::spawn(track_loop(
            geolocation,
            options,
            Arc::clone(&self.fix_tx),
            Arc::clone(&self.error_tx),
            on_fix,
            token.clone(),
        ));
        TrackHandle {
            token,
            task: Some(task),
        }
    }
}

async fn track_loop<F>(
    geolocation: Arc<dyn Geolocation>,
    options: TrackOptions,
    fix_tx: Arc<watch::Sender<Option<GeoFix>>>,
    error_tx: Arc<watch::Sender<Option<GeolocationError>>>,
    mut on_fix: F,
    token: CancellationToken,
) where
    F: FnMut(GeoFix) + Send + 'static,
{
    let timeout = Duration::from_millis(options.position.timeout_ms);
    let resample = Duration::from_millis(options.position.max_age_ms.max(MIN_RESAMPLE_MS));

    loop {
        let request =
            tokio::time::timeout(timeout, geolocation.current_position(&options.position));
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            outcome = request => outcome,
        };

        match outcome {
            Ok(Ok(position)) => {
                let fix = GeoFix::from_position(position, Utc::now());
                fix_tx.send_replace(Some(fix));
                on_fix(fix);
            }
            Ok(Err(err)) => {
                log_warn!("location unavailable: {err}");
                error_tx.send_replace(Some(err));
            }
            Err(_) => {
                log_warn!(
                    "no location fix within {}ms; giving up for this session",
                    options.position.timeout_ms
                );
                error_tx.send_replace(Some(GeolocationError::Timeout));
                break;
            }
        }

        if !options.continuous {
            break;
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(resample) => {}
        }
    }

    log_info!("location tracking finished");
}

/// Handle to an in-flight tracking request. Cancelling (or dropping) it
/// guarantees that results arriving afterwards are ignored.
pub struct TrackHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TrackHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Wait for the tracking task to wind down.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                log_warn!("location task failed to join: {err}");
            }
        }
    }
}

impl Drop for TrackHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
