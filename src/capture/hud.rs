use serde::Serialize;

use crate::camera::{CameraSessionState, ErrorPrompt};
use crate::detection::DetectionState;
use crate::location::GeoFix;

pub const STATUS_DETECTED: &str = "AI Detected";
pub const STATUS_SCANNING: &str = "Scanning...";

/// What the live view shows around the video surface at one instant.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HudSnapshot {
    pub camera: CameraSessionState,
    pub error_prompt: Option<ErrorPrompt>,
    pub category: String,
    /// `POTHOLE (85%)` while the detector is confident.
    pub banner: Option<String>,
    pub status: &'static str,
    pub location_label: Option<String>,
    pub capture_enabled: bool,
}

impl HudSnapshot {
    pub(crate) fn compose(
        camera: CameraSessionState,
        category: &str,
        detection: &DetectionState,
        threshold: f32,
        location: Option<GeoFix>,
    ) -> Self {
        let banner = detection.banner_text(threshold);
        let status = if banner.is_some() {
            STATUS_DETECTED
        } else {
            STATUS_SCANNING
        };
        Self {
            error_prompt: camera.failure().map(|failure| failure.prompt()),
            capture_enabled: camera.is_streaming(),
            camera,
            category: category.to_string(),
            banner,
            status,
            location_label: location.map(|fix| fix.short_label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraFailure, FailureReason, PromptAction};
    use chrono::Utc;

    #[test]
    fn scanning_until_confident() {
        let hud = HudSnapshot::compose(
            CameraSessionState::Streaming,
            "trash",
            &DetectionState::new("trash", 0.65),
            0.7,
            None,
        );
        assert_eq!(hud.status, STATUS_SCANNING);
        assert_eq!(hud.banner, None);
        assert!(hud.capture_enabled);
        assert_eq!(hud.location_label, None);
    }

    #[test]
    fn confident_detection_with_location() {
        let fix = GeoFix {
            latitude: 40.7128,
            longitude: -74.006,
            captured_at: Utc::now(),
        };
        let hud = HudSnapshot::compose(
            CameraSessionState::Streaming,
            "pothole",
            &DetectionState::new("damaged_sign", 0.9),
            0.7,
            Some(fix),
        );
        assert_eq!(hud.status, STATUS_DETECTED);
        assert_eq!(hud.banner.as_deref(), Some("DAMAGED SIGN (90%)"));
        assert_eq!(hud.location_label.as_deref(), Some("40.712800, -74.006000"));
    }

    #[test]
    fn failure_disables_capture_and_offers_retry() {
        let failure = CameraFailure::new(FailureReason::PermissionDenied, "denied");
        let hud = HudSnapshot::compose(
            CameraSessionState::Error(failure),
            "graffiti",
            &DetectionState::default(),
            0.7,
            None,
        );
        assert!(!hud.capture_enabled);
        let prompt = hud.error_prompt.expect("prompt");
        assert_eq!(prompt.actions, [PromptAction::Retry, PromptAction::Cancel]);
    }
}
