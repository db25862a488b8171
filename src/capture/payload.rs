use serde::Serialize;

use crate::location::GeoFix;

/// Everything the report form receives from one capture.
///
/// Built once per capture and never mutated afterwards.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapturePayload {
    image_data: String,
    location: Option<GeoFix>,
    category: String,
    confidence_percent: u8,
}

impl CapturePayload {
    pub(crate) fn new(
        image_data: String,
        location: Option<GeoFix>,
        category: String,
        confidence_percent: u8,
    ) -> Self {
        Self {
            image_data,
            location,
            category,
            confidence_percent: confidence_percent.min(100),
        }
    }

    /// `data:image/jpeg;base64,...`
    pub fn image_data(&self) -> &str {
        &self.image_data
    }

    pub fn location(&self) -> Option<&GeoFix> {
        self.location.as_ref()
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn confidence_percent(&self) -> u8 {
        self.confidence_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn serializes_camel_case() {
        let fix = GeoFix {
            latitude: 40.7128,
            longitude: -74.006,
            captured_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };
        let payload = CapturePayload::new(
            "data:image/jpeg;base64,AA==".into(),
            Some(fix),
            "pothole".into(),
            85,
        );
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["imageData"], "data:image/jpeg;base64,AA==");
        assert_eq!(json["category"], "pothole");
        assert_eq!(json["confidencePercent"], 85);
        assert_eq!(json["location"]["latitude"], 40.7128);
        assert!(json["location"]["capturedAt"].is_string());
    }

    #[test]
    fn missing_location_is_null() {
        let payload = CapturePayload::new(String::new(), None, "trash".into(), 0);
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json["location"].is_null());
    }
}
