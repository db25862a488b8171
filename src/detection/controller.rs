use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::camera::{CameraSessionState, FrameSource};

use super::worker::detection_loop;
use super::{DetectionState, Detector};

/// Owns the detection worker and the single-writer detection state.
pub struct DetectionController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    detections: Arc<watch::Sender<DetectionState>>,
}

impl DetectionController {
    pub fn new() -> Self {
        let (detections, _) = watch::channel(DetectionState::default());
        Self {
            handle: None,
            cancel_token: None,
            detections: Arc::new(detections),
        }
    }

    /// Most recently published detection.
    pub fn latest(&self) -> DetectionState {
        self.detections.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetectionState> {
        self.detections.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn start(
        &mut self,
        detector: Box<dyn Detector>,
        frames: Arc<dyn FrameSource>,
        camera_state: watch::Receiver<CameraSessionState>,
        interval: Duration,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("detection already active");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(detection_loop(
            detector,
            frames,
            camera_state,
            Arc::clone(&self.detections),
            interval,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!("detection worker started");
        Ok(())
    }

    /// Signal the worker to stop without waiting for it.
    pub fn cancel(&self) {
        if let Some(token) = &self.cancel_token {
            token.cancel();
        }
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("detection worker task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for DetectionController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DetectionController {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraSession, Frame};
    use crate::platform::simulated::SimulatedCamera;
    use crate::platform::{FacingMode, MediaDevices, Resolution};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and fails the test if it ever runs against a session
    /// that is not streaming.
    struct GateCheckingDetector {
        calls: Arc<AtomicUsize>,
        session: CameraSession,
    }

    impl Detector for GateCheckingDetector {
        fn detect(&mut self, _frame: &Frame) -> DetectionState {
            assert!(self.session.state().is_streaming(), "detector ran while not streaming");
            self.calls.fetch_add(1, Ordering::SeqCst);
            DetectionState::new("pothole", 0.9)
        }
    }

    fn setup() -> (Arc<SimulatedCamera>, CameraSession, Arc<AtomicUsize>, DetectionController) {
        let camera = Arc::new(SimulatedCamera::new(Resolution::new(16, 16)));
        let session = CameraSession::new(Some(camera.clone() as Arc<dyn MediaDevices>));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut controller = DetectionController::new();
        controller
            .start(
                Box::new(GateCheckingDetector {
                    calls: Arc::clone(&calls),
                    session: session.clone(),
                }),
                Arc::new(session.clone()),
                session.subscribe(),
                Duration::from_millis(2_000),
            )
            .expect("start detection");
        (camera, session, calls, controller)
    }

    #[tokio::test(start_paused = true)]
    async fn never_ticks_while_not_streaming() {
        let (_camera, session, calls, mut controller) = setup();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.latest(), DetectionState::default());

        session.start(FacingMode::Environment, Resolution::HD).await.unwrap();
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(controller.latest().label.as_deref(), Some("pothole"));

        session.stop();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        controller.stop().await.expect("stop");
        assert!(!controller.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn resumes_after_restart() {
        let (_camera, session, calls, mut controller) = setup();

        session.start(FacingMode::Environment, Resolution::HD).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        session.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        session.start(FacingMode::Environment, Resolution::HD).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let (_camera, session, _calls, mut controller) = setup();
        let err = controller
            .start(
                Box::new(crate::detection::MockDetector::with_seed(1)),
                Arc::new(session.clone()),
                session.subscribe(),
                Duration::from_millis(2_000),
            )
            .unwrap_err();
        assert!(err.to_string().contains("already active"));
        controller.stop().await.unwrap();
    }
}
