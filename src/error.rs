use thiserror::Error;

use crate::camera::CameraFailure;
use crate::scene::SceneError;

/// Errors surfaced by the capture view to its caller.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The AR flow was opened without a selected category.
    #[error("select an issue category before starting the camera")]
    CategoryRequired,
    /// A capture was requested while the camera is not streaming.
    #[error("camera is not streaming; capture is unavailable")]
    NotReady,
    #[error("no live frame: camera session is not streaming")]
    NotStreaming,
    #[error("camera failure: {0}")]
    Camera(CameraFailure),
    #[error("failed to encode capture: {0}")]
    Encode(#[from] image::ImageError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    /// Background task bookkeeping failed (worker start or join).
    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

impl From<CameraFailure> for CaptureError {
    fn from(failure: CameraFailure) -> Self {
        CaptureError::Camera(failure)
    }
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;
