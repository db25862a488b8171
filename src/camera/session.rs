use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use uuid::Uuid;

use crate::error::CaptureError;
use crate::platform::{FacingMode, MediaDevices, MediaStream, Resolution, VideoConstraints};

use super::frame::{Frame, FrameSource};
use super::state::{CameraFailure, CameraSessionState, FailureReason};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

struct Inner {
    stream: Option<Box<dyn MediaStream>>,
    last_request: Option<VideoConstraints>,
    /// Bumped by every request and every stop; an acquisition that resolves
    /// under an older generation is released on arrival. State changes are
    /// published while this lock is held.
    generation: u64,
    next_frame_id: u64,
}

impl Inner {
    fn release_stream(&mut self, session_id: &str) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            log_info!("camera session {session_id}: released stream {}", stream.id());
        }
    }
}

/// Owns the video stream for one capture view.
///
/// Cloning yields another handle to the same session. The stream is released
/// on `stop()`, on failure, and when the last handle is dropped.
#[derive(Clone)]
pub struct CameraSession {
    id: Arc<str>,
    devices: Option<Arc<dyn MediaDevices>>,
    inner: Arc<Mutex<Inner>>,
    state_tx: Arc<watch::Sender<CameraSessionState>>,
}

impl CameraSession {
    pub fn new(devices: Option<Arc<dyn MediaDevices>>) -> Self {
        let (state_tx, _) = watch::channel(CameraSessionState::Idle);
        Self {
            id: Arc::from(Uuid::new_v4().to_string()),
            devices,
            inner: Arc::new(Mutex::new(Inner {
                stream: None,
                last_request: None,
                generation: 0,
                next_frame_id: 0,
            })),
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> CameraSessionState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CameraSessionState> {
        self.state_tx.subscribe()
    }

    pub async fn start(
        &self,
        facing: FacingMode,
        target_resolution: Resolution,
    ) -> Result<(), CameraFailure> {
        self.request(VideoConstraints::preferred(facing, target_resolution))
            .await
    }

    /// Re-issue the last request. A no-op while streaming or requesting.
    pub async fn retry(&self) -> Result<(), CameraFailure> {
        match self.state() {
            CameraSessionState::Streaming | CameraSessionState::Requesting => return Ok(()),
            CameraSessionState::Idle | CameraSessionState::Error(_) => {}
        }
        let last_request = self.lock().last_request;
        match last_request {
            Some(constraints) => self.request(constraints).await,
            None => Err(CameraFailure::new(
                FailureReason::Other,
                "no previous camera request to retry",
            )),
        }
    }

    async fn request(&self, constraints: VideoConstraints) -> Result<(), CameraFailure> {
        let generation = {
            let mut inner = self.lock();
            inner.release_stream(&self.id);
            inner.generation += 1;
            inner.last_request = Some(constraints);
            self.state_tx.send_replace(CameraSessionState::Requesting);
            inner.generation
        };

        let Some(devices) = self.devices.clone() else {
            return Err(self.fail(
                generation,
                CameraFailure::new(FailureReason::Unsupported, "media devices unavailable"),
            ));
        };

        log_info!(
            "camera session {}: requesting stream (facing={:?}, ideal={:?})",
            self.id,
            constraints.facing.map(|f| f.as_str()),
            constraints.ideal
        );

        let mut stream = match devices.get_user_media(&constraints).await {
            Ok(stream) => stream,
            Err(err) => {
                log_warn!("camera session {}: stream request failed: {err}", self.id);
                return Err(self.fail(generation, CameraFailure::from_media_error(&err)));
            }
        };

        let mut inner = self.lock();
        if inner.generation != generation {
            stream.stop_tracks();
            log_info!(
                "camera session {}: dropped stream {} acquired after stop",
                self.id,
                stream.id()
            );
            return Err(CameraFailure::new(
                FailureReason::Other,
                "camera request superseded",
            ));
        }

        if let Err(err) = stream.play() {
            stream.stop_tracks();
            drop(inner);
            log_warn!("camera session {}: playback failed: {err}", self.id);
            return Err(self.fail(generation, CameraFailure::from_media_error(&err)));
        }

        let resolution = stream.resolution();
        log_info!(
            "camera session {}: streaming {} at {}x{}",
            self.id,
            stream.id(),
            resolution.width,
            resolution.height
        );
        inner.stream = Some(stream);
        self.state_tx.send_replace(CameraSessionState::Streaming);
        Ok(())
    }

    /// Enter `Error(PermissionDenied)` for this request without asking the
    /// device. `retry()` re-issues the same request.
    pub fn deny(&self, facing: FacingMode, target_resolution: Resolution) -> CameraFailure {
        let failure =
            CameraFailure::new(FailureReason::PermissionDenied, "camera permission denied");
        let mut inner = self.lock();
        inner.release_stream(&self.id);
        inner.generation += 1;
        inner.last_request = Some(VideoConstraints::preferred(facing, target_resolution));
        self.state_tx
            .send_replace(CameraSessionState::Error(failure.clone()));
        log_warn!("camera session {}: {failure}", self.id);
        failure
    }

    /// Record a failure unless a newer request or a stop already took over.
    fn fail(&self, generation: u64, failure: CameraFailure) -> CameraFailure {
        let inner = self.lock();
        if inner.generation == generation {
            self.state_tx
                .send_replace(CameraSessionState::Error(failure.clone()));
        }
        failure
    }

    /// Release every track and return to idle. Safe to call in any state.
    pub fn stop(&self) {
        {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.release_stream(&self.id);
            self.state_tx.send_replace(CameraSessionState::Idle);
        }
    }

    pub fn current_frame(&self) -> Result<Frame, CaptureError> {
        let mut inner = self.lock();
        if !self.state_tx.borrow().is_streaming() {
            return Err(CaptureError::NotStreaming);
        }
        let Some(stream) = inner.stream.as_ref() else {
            return Err(CaptureError::NotStreaming);
        };
        let image = stream
            .snapshot()
            .map_err(|err| CameraFailure::from_media_error(&err))?;
        let id = inner.next_frame_id;
        inner.next_frame_id += 1;
        Ok(Frame::new(id, image))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock still holds a valid stream slot; keep releasing it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FrameSource for CameraSession {
    fn current_frame(&self) -> Result<Frame, CaptureError> {
        CameraSession::current_frame(self)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::simulated::SimulatedCamera;
    use crate::platform::MediaError;

    fn session_with(camera: &Arc<SimulatedCamera>) -> CameraSession {
        CameraSession::new(Some(camera.clone() as Arc<dyn MediaDevices>))
    }

    #[tokio::test]
    async fn start_then_stop_releases_stream() {
        let camera = Arc::new(SimulatedCamera::new(Resolution::new(64, 48)));
        let session = session_with(&camera);

        session
            .start(FacingMode::Environment, Resolution::HD)
            .await
            .expect("start");
        assert!(session.state().is_streaming());
        assert_eq!(camera.acquired(), 1);
        assert_eq!(camera.released(), 0);

        session.stop();
        assert_eq!(session.state(), CameraSessionState::Idle);
        assert_eq!(camera.released(), 1);
    }

    #[tokio::test]
    async fn restart_while_streaming_keeps_one_stream() {
        let camera = Arc::new(SimulatedCamera::new(Resolution::new(64, 48)));
        let session = session_with(&camera);

        session.start(FacingMode::Environment, Resolution::HD).await.unwrap();
        session.start(FacingMode::User, Resolution::HD).await.unwrap();
        assert_eq!(camera.acquired(), 2);
        assert_eq!(camera.released(), 1);
        assert_eq!(camera.open_streams(), 1);
        assert_eq!(camera.last_constraints().unwrap().facing, Some(FacingMode::User));
    }

    #[tokio::test]
    async fn permission_denial_enters_error_state() {
        let camera = Arc::new(SimulatedCamera::new(Resolution::new(64, 48)));
        camera.push_outcome(Err(MediaError::NotAllowed));
        let session = session_with(&camera);

        let failure = session
            .start(FacingMode::Environment, Resolution::HD)
            .await
            .unwrap_err();
        assert_eq!(failure.reason, FailureReason::PermissionDenied);
        assert_eq!(
            session.state().failure().map(|f| f.reason),
            Some(FailureReason::PermissionDenied)
        );
        assert_eq!(camera.acquired(), 0);
    }

    #[tokio::test]
    async fn playback_failure_releases_acquired_stream() {
        let camera = Arc::new(SimulatedCamera::new(Resolution::new(64, 48)));
        camera.fail_next_playback("autoplay blocked");
        let session = session_with(&camera);

        let failure = session
            .start(FacingMode::Environment, Resolution::HD)
            .await
            .unwrap_err();
        assert_eq!(failure.reason, FailureReason::Other);
        assert_eq!(camera.acquired(), 1);
        assert_eq!(camera.released(), 1);
    }

    #[tokio::test]
    async fn missing_media_devices_is_unsupported() {
        let session = CameraSession::new(None);
        let failure = session
            .start(FacingMode::Environment, Resolution::HD)
            .await
            .unwrap_err();
        assert_eq!(failure.reason, FailureReason::Unsupported);
    }

    #[tokio::test]
    async fn current_frame_requires_streaming() {
        let camera = Arc::new(SimulatedCamera::new(Resolution::new(32, 16)));
        let session = session_with(&camera);
        assert!(matches!(
            session.current_frame(),
            Err(CaptureError::NotStreaming)
        ));

        session.start(FacingMode::Environment, Resolution::HD).await.unwrap();
        let frame = session.current_frame().expect("frame");
        assert_eq!(frame.dimensions(), (32, 16));
        assert_eq!(session.current_frame().unwrap().id, frame.id + 1);
    }

    #[tokio::test]
    async fn denied_request_skips_device_and_retries_later() {
        let camera = Arc::new(SimulatedCamera::new(Resolution::new(64, 48)));
        let session = session_with(&camera);

        let failure = session.deny(FacingMode::User, Resolution::new(640, 480));
        assert_eq!(failure.reason, FailureReason::PermissionDenied);
        assert_eq!(session.state(), CameraSessionState::Error(failure));
        assert_eq!(camera.request_count(), 0);

        session.retry().await.expect("retry");
        assert!(session.state().is_streaming());
        let constraints = camera.last_constraints().expect("constraints");
        assert_eq!(constraints.facing, Some(FacingMode::User));
        assert_eq!(constraints.ideal, Some(Resolution::new(640, 480)));
    }

    #[tokio::test]
    async fn retry_without_request_is_rejected() {
        let session = CameraSession::new(None);
        assert!(session.retry().await.is_err());
        assert_eq!(session.state(), CameraSessionState::Idle);
    }

    #[tokio::test]
    async fn dropping_last_handle_releases_stream() {
        let camera = Arc::new(SimulatedCamera::new(Resolution::new(8, 8)));
        {
            let session = session_with(&camera);
            let other = session.clone();
            session.start(FacingMode::Environment, Resolution::HD).await.unwrap();
            drop(session);
            assert_eq!(camera.released(), 0);
            drop(other);
        }
        assert_eq!(camera.released(), 1);
    }
}
