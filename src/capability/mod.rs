pub mod permissions;
pub mod probe;

use serde::{Deserialize, Serialize};

pub use permissions::negotiate;
pub use probe::probe;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitySnapshot {
    pub has_camera: bool,
    pub has_geolocation: bool,
    pub is_secure_context: bool,
    pub is_mobile: bool,
    pub supports_streaming_media: bool,
}

impl CapabilitySnapshot {
    /// Whether the canvas capture flow can run at all. Geolocation is optional.
    pub fn supports_ar_capture(&self) -> bool {
        self.has_camera && self.supports_streaming_media
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PermissionState {
    Granted,
    Denied,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PermissionReport {
    pub camera: PermissionState,
    pub geolocation: PermissionState,
}
