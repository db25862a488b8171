use chrono::{DateTime, Utc};
use image::RgbaImage;

/// A snapshot of the live video at native resolution.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: u64,
    pub captured_at: DateTime<Utc>,
    pub image: RgbaImage,
}

impl Frame {
    pub fn new(id: u64, image: RgbaImage) -> Self {
        Self {
            id,
            captured_at: Utc::now(),
            image,
        }
    }

    /// (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Read-only access to live frames for components that must not own the stream.
pub trait FrameSource: Send + Sync {
    fn current_frame(&self) -> Result<Frame, crate::error::CaptureError>;
}
