use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::camera::{CameraSessionState, FrameSource};

use super::{DetectionState, Detector};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Run `detector` every `interval` while the camera streams.
///
/// Outside of `Streaming` the loop parks on the camera state channel instead
/// of ticking, so no detection is ever produced against a frozen or absent
/// frame. The first tick of each streaming period fires one interval in.
pub async fn detection_loop(
    mut detector: Box<dyn Detector>,
    frames: Arc<dyn FrameSource>,
    mut camera_state: watch::Receiver<CameraSessionState>,
    detections: Arc<watch::Sender<DetectionState>>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    loop {
        let streaming = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            streaming = async {
                camera_state.wait_for(|state| state.is_streaming()).await.map(|_| ())
            } => streaming,
        };
        if streaming.is_err() {
            log_info!("camera session closed; detection loop exiting");
            break;
        }

        log_info!("camera streaming; detection resumed every {}ms", interval.as_millis());
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    log_info!("detection loop shutting down");
                    return;
                }
                changed = camera_state.changed() => {
                    if changed.is_err() || !camera_state.borrow().is_streaming() {
                        log_info!("camera left streaming state; detection paused");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if !camera_state.borrow().is_streaming() {
                        break;
                    }
                    match frames.current_frame() {
                        Ok(frame) => {
                            let state = detector.detect(&frame);
                            detections.send_replace(state);
                        }
                        Err(err) => log_warn!("detection skipped: {err}"),
                    }
                }
            }
        }
    }
}
