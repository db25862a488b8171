pub mod geo;
pub mod tracker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::Position;

pub use geo::{calculate_distance, format_gps_coordinates};
pub use tracker::{LocationTracker, TrackHandle, TrackOptions};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
}

impl GeoFix {
    pub fn from_position(position: Position, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude: position.latitude,
            longitude: position.longitude,
            captured_at,
        }
    }

    /// Compact label shown over the live view.
    pub fn short_label(&self) -> String {
        format!("{:.6}, {:.6}", self.latitude, self.longitude)
    }

    pub fn formatted(&self) -> String {
        format_gps_coordinates(self.latitude, self.longitude)
    }

    pub fn distance_km(&self, other: &GeoFix) -> f64 {
        calculate_distance(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}
