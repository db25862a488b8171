use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::camera::{CameraFailure, CameraSession, CameraSessionState};
use crate::capability::{negotiate, PermissionReport, PermissionState};
use crate::detection::{DetectionController, DetectionState, Detector};
use crate::encoding::encode_jpeg;
use crate::error::{CaptureError, CaptureResult};
use crate::location::{GeoFix, LocationTracker, TrackHandle};
use crate::overlay::OverlayRenderer;
use crate::platform::{FacingMode, GeolocationError, Platform, Resolution};
use crate::settings::CaptureSettings;

use super::hud::HudSnapshot;
use super::payload::CapturePayload;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub selected_category: String,
    #[serde(default)]
    pub facing: FacingMode,
    #[serde(default)]
    pub resolution: Resolution,
}

impl CaptureRequest {
    pub fn new(selected_category: impl Into<String>) -> Self {
        Self {
            selected_category: selected_category.into(),
            facing: FacingMode::Environment,
            resolution: Resolution::HD,
        }
    }

    /// Request using the configured camera preferences.
    pub fn from_settings(selected_category: impl Into<String>, settings: &CaptureSettings) -> Self {
        Self {
            selected_category: selected_category.into(),
            facing: settings.camera.facing,
            resolution: settings.camera.resolution,
        }
    }
}

/// The report form that receives captures.
pub trait ReportIntake: Send + Sync {
    fn on_capture(&self, payload: CapturePayload);
    fn on_close(&self);
}

/// One open AR capture view.
///
/// Owns the camera session, the detection worker and the location request for
/// as long as the view is open. `close()` tears all three down; dropping the
/// coordinator without closing does the same minus waiting for the worker.
pub struct CaptureCoordinator {
    platform: Platform,
    request: CaptureRequest,
    category: String,
    intake: Arc<dyn ReportIntake>,
    settings: CaptureSettings,
    renderer: OverlayRenderer,
    camera: CameraSession,
    location: LocationTracker,
    tracking: Option<TrackHandle>,
    detection: DetectionController,
    permissions: PermissionReport,
    closed: bool,
}

impl CaptureCoordinator {
    pub async fn open(
        platform: Platform,
        request: CaptureRequest,
        intake: Arc<dyn ReportIntake>,
        settings: CaptureSettings,
        detector: Box<dyn Detector>,
    ) -> CaptureResult<Self> {
        let category = request.selected_category.trim().to_string();
        if category.is_empty() {
            return Err(CaptureError::CategoryRequired);
        }

        let permissions = negotiate(&platform, &settings.location.position_options()).await;
        log_info!(
            "opening capture view for '{category}' (camera={:?}, geolocation={:?})",
            permissions.camera,
            permissions.geolocation
        );

        let camera = CameraSession::new(platform.media.clone());
        let location = LocationTracker::new(platform.geolocation.clone());
        let mut detection = DetectionController::new();
        detection.start(
            detector,
            Arc::new(camera.clone()),
            camera.subscribe(),
            settings.detection.interval(),
        )?;

        let mut coordinator = Self {
            renderer: OverlayRenderer::new(settings.detection.confidence_threshold),
            platform,
            request,
            category,
            intake,
            settings,
            camera,
            location,
            tracking: None,
            detection,
            permissions,
            closed: false,
        };
        coordinator.start_tracking();

        // A camera failure leaves the view open with a retry prompt.
        if let Err(failure) = coordinator.start_camera().await {
            log_warn!("camera failed to start: {failure}");
        }

        Ok(coordinator)
    }

    /// Start location tracking unless geolocation is denied or a request is
    /// already running.
    fn start_tracking(&mut self) {
        if self.tracking.is_some() {
            return;
        }
        if self.permissions.geolocation == PermissionState::Denied {
            self.location.report_error(GeolocationError::PermissionDenied);
            return;
        }
        let handle = self.location.track(
            |fix| {
                log_info!("location fix {}", fix.formatted());
            },
            self.settings.location.track_options(),
        );
        self.tracking = Some(handle);
    }

    async fn start_camera(&self) -> Result<(), CameraFailure> {
        let (facing, resolution) = (self.request.facing, self.request.resolution);
        if self.permissions.camera == PermissionState::Denied {
            return Err(self.camera.deny(facing, resolution));
        }
        self.camera.start(facing, resolution).await
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn permissions(&self) -> PermissionReport {
        self.permissions
    }

    pub fn camera_state(&self) -> CameraSessionState {
        self.camera.state()
    }

    pub fn subscribe_camera(&self) -> watch::Receiver<CameraSessionState> {
        self.camera.subscribe()
    }

    pub fn detection(&self) -> DetectionState {
        self.detection.latest()
    }

    pub fn subscribe_detection(&self) -> watch::Receiver<DetectionState> {
        self.detection.subscribe()
    }

    pub fn location(&self) -> Option<GeoFix> {
        self.location.latest()
    }

    pub fn location_error(&self) -> Option<GeolocationError> {
        self.location.last_error()
    }

    pub fn subscribe_location(&self) -> watch::Receiver<Option<GeoFix>> {
        self.location.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn hud(&self) -> HudSnapshot {
        HudSnapshot::compose(
            self.camera.state(),
            &self.category,
            &self.detection.latest(),
            self.renderer.threshold(),
            self.location.latest(),
        )
    }

    /// Snapshot the live frame, composite the overlay and hand the result to
    /// the report intake.
    ///
    /// Rejected with `NotReady` before touching the stream unless the camera
    /// is streaming.
    pub fn capture(&self) -> CaptureResult<CapturePayload> {
        if self.closed || !self.camera.state().is_streaming() {
            return Err(CaptureError::NotReady);
        }

        let frame = self.camera.current_frame().map_err(|err| match err {
            CaptureError::NotStreaming => CaptureError::NotReady,
            other => other,
        })?;
        let detection = self.detection.latest();
        let (width, height) = frame.dimensions();
        let composited = self.renderer.render(&frame.image, &detection, width, height);
        let encoded = encode_jpeg(&composited, self.settings.capture.jpeg_quality)?;

        let (category, confidence_percent) =
            match detection.confident_label(self.renderer.threshold()) {
                Some(label) => (label.to_string(), detection.confidence_percent()),
                None => (self.category.clone(), 0),
            };
        let payload = CapturePayload::new(
            encoded.to_data_uri(),
            self.location.latest(),
            category,
            confidence_percent,
        );

        log_info!(
            "captured frame {} as '{}' ({}%), {} bytes",
            frame.id,
            payload.category(),
            payload.confidence_percent(),
            encoded.bytes.len()
        );
        self.intake.on_capture(payload.clone());
        Ok(payload)
    }

    /// Re-check permissions and re-issue the last camera request.
    pub async fn retry(&mut self) -> CaptureResult<()> {
        if self.closed {
            return Err(CaptureError::NotReady);
        }
        let geo_options = self.settings.location.position_options();
        self.permissions = negotiate(&self.platform, &geo_options).await;
        self.start_tracking();

        if self.permissions.camera == PermissionState::Denied {
            let failure = self.camera.deny(self.request.facing, self.request.resolution);
            return Err(failure.into());
        }
        self.camera.retry().await?;
        Ok(())
    }

    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(err) = self.detection.stop().await {
            log_error!("failed to stop detection worker: {err:#}");
        }
        self.camera.stop();
        if let Some(handle) = self.tracking.take() {
            handle.cancel();
            handle.join().await;
        }

        log_info!("capture view closed");
        self.intake.on_close();
    }
}

impl Drop for CaptureCoordinator {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.detection.cancel();
        self.camera.stop();
        if let Some(handle) = self.tracking.take() {
            handle.cancel();
        }
        self.intake.on_close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::FailureReason;
    use crate::platform::simulated::{SimulatedCamera, SimulatedPermissions, SimulatedPlatform};
    use crate::platform::{MediaError, PermissionStatus};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingIntake {
        payloads: Mutex<Vec<CapturePayload>>,
        closed: Mutex<usize>,
    }

    impl ReportIntake for RecordingIntake {
        fn on_capture(&self, payload: CapturePayload) {
            self.payloads.lock().unwrap().push(payload);
        }

        fn on_close(&self) {
            *self.closed.lock().unwrap() += 1;
        }
    }

    struct Fixed(DetectionState);

    impl Detector for Fixed {
        fn detect(&mut self, _frame: &crate::camera::Frame) -> DetectionState {
            self.0.clone()
        }
    }

    fn small_platform() -> SimulatedPlatform {
        SimulatedPlatform::new().with_camera(SimulatedCamera::new(Resolution::new(64, 48)))
    }

    async fn open(
        sim: &SimulatedPlatform,
        category: &str,
        intake: Arc<RecordingIntake>,
    ) -> CaptureResult<CaptureCoordinator> {
        CaptureCoordinator::open(
            sim.platform(),
            CaptureRequest::new(category),
            intake,
            CaptureSettings::default(),
            Box::new(Fixed(DetectionState::new("trash", 0.81))),
        )
        .await
    }

    #[tokio::test]
    async fn blank_category_is_rejected_before_any_side_effect() {
        let sim = small_platform();
        let intake = Arc::new(RecordingIntake::default());
        let err = open(&sim, "   ", intake.clone()).await.err().expect("rejected");
        assert!(matches!(err, CaptureError::CategoryRequired));
        assert_eq!(sim.camera.request_count(), 0);
        assert_eq!(sim.geolocation.calls(), 0);
        assert_eq!(*intake.closed.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn close_releases_everything_and_notifies_once() {
        let sim = small_platform();
        let intake = Arc::new(RecordingIntake::default());
        let mut view = open(&sim, "pothole", intake.clone()).await.unwrap();
        assert!(view.camera_state().is_streaming());
        assert_eq!(sim.camera.open_streams(), 1);

        view.close().await;
        view.close().await;
        assert_eq!(sim.camera.open_streams(), 0);
        assert!(matches!(view.capture(), Err(CaptureError::NotReady)));
        drop(view);
        assert_eq!(*intake.closed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn drop_without_close_releases_stream() {
        let sim = small_platform();
        let intake = Arc::new(RecordingIntake::default());
        let view = open(&sim, "graffiti", intake.clone()).await.unwrap();
        drop(view);
        assert_eq!(sim.camera.open_streams(), 0);
        assert_eq!(*intake.closed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn camera_failure_keeps_view_open_with_prompt() {
        let camera = SimulatedCamera::new(Resolution::new(64, 48));
        camera.push_outcome(Err(MediaError::NotFound));
        let sim = SimulatedPlatform::new().with_camera(camera);
        let intake = Arc::new(RecordingIntake::default());

        let mut view = open(&sim, "trash", intake).await.unwrap();
        let hud = view.hud();
        assert!(!hud.capture_enabled);
        assert_eq!(hud.error_prompt.expect("prompt").title, "No camera found");

        view.retry().await.unwrap();
        assert!(view.camera_state().is_streaming());
        view.close().await;
    }

    #[tokio::test]
    async fn denied_permissions_skip_camera_and_location() {
        let sim = small_platform()
            .with_permissions(SimulatedPermissions::all(PermissionStatus::Denied));
        let intake = Arc::new(RecordingIntake::default());

        let mut view = open(&sim, "pothole", intake).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(view.permissions().camera, PermissionState::Denied);
        assert_eq!(
            view.camera_state().failure().map(|f| f.reason),
            Some(FailureReason::PermissionDenied)
        );
        let prompt = view.hud().error_prompt.expect("prompt");
        assert_eq!(prompt.title, "Camera permission denied");
        assert_eq!(view.location_error(), Some(GeolocationError::PermissionDenied));
        assert!(view.location().is_none());
        assert_eq!(sim.camera.request_count(), 0);
        assert_eq!(sim.geolocation.calls(), 0);

        let err = view.retry().await.unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Camera(ref failure) if failure.reason == FailureReason::PermissionDenied
        ));
        assert_eq!(sim.camera.request_count(), 0);
        assert_eq!(sim.geolocation.calls(), 0);
        view.close().await;
    }
}
