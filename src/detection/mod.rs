pub mod controller;
pub mod mock;
pub mod worker;

use serde::{Deserialize, Serialize};

use crate::camera::Frame;

pub use controller::DetectionController;
pub use mock::{CatalogDetector, MockDetector};

/// Detections at or below this confidence are not shown and not used as the
/// capture category.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Pothole,
    BrokenStreetlight,
    Graffiti,
    Trash,
    DamagedSign,
}

impl IssueCategory {
    pub const ALL: [IssueCategory; 5] = [
        IssueCategory::Pothole,
        IssueCategory::BrokenStreetlight,
        IssueCategory::Graffiti,
        IssueCategory::Trash,
        IssueCategory::DamagedSign,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::Pothole => "pothole",
            IssueCategory::BrokenStreetlight => "broken_streetlight",
            IssueCategory::Graffiti => "graffiti",
            IssueCategory::Trash => "trash",
            IssueCategory::DamagedSign => "damaged_sign",
        }
    }
}

/// Region of interest in frame pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectionState {
    pub label: Option<String>,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl DetectionState {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: Some(label.into()),
            confidence: confidence.clamp(0.0, 1.0),
            bounding_box: None,
        }
    }

    /// The label, only if the detector is confident about it.
    pub fn confident_label(&self, threshold: f32) -> Option<&str> {
        if self.confidence > threshold {
            self.label.as_deref()
        } else {
            None
        }
    }

    pub fn confidence_percent(&self) -> u8 {
        (self.confidence.clamp(0.0, 1.0) * 100.0).round() as u8
    }

    /// `BROKEN STREETLIGHT (85%)`
    pub fn banner_text(&self, threshold: f32) -> Option<String> {
        self.confident_label(threshold)
            .map(|label| format!("{} ({}%)", display_label(label), self.confidence_percent()))
    }
}

/// Upper-cased label with its first underscore shown as a space.
pub fn display_label(label: &str) -> String {
    label.replacen('_', " ", 1).to_uppercase()
}

/// A classifier over live frames. Implementations replace the mock without
/// touching the camera, overlay or capture code.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> DetectionState;
}
