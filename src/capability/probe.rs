use crate::platform::{HostContext, Platform, VideoConstraints};

use super::CapabilitySnapshot;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const MOBILE_MARKERS: [&str; 8] = [
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

pub fn is_secure_context(host: &HostContext) -> bool {
    host.protocol == "https:" || host.hostname == "localhost"
}

pub fn is_mobile(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    MOBILE_MARKERS.iter().any(|marker| ua.contains(marker))
}

/// Snapshot of what the device can do right now. Never cached: each call
/// queries the platform again.
///
/// Camera presence is tested by opening a throwaway stream, which is stopped
/// before this returns.
pub async fn probe(platform: &Platform) -> CapabilitySnapshot {
    let mut snapshot = CapabilitySnapshot {
        has_camera: false,
        has_geolocation: platform.geolocation.is_some(),
        is_secure_context: is_secure_context(&platform.host),
        is_mobile: is_mobile(&platform.host.user_agent),
        supports_streaming_media: platform.media.is_some(),
    };

    if let Some(media) = &platform.media {
        match media.get_user_media(&VideoConstraints::any()).await {
            Ok(mut stream) => {
                stream.stop_tracks();
                snapshot.has_camera = true;
            }
            Err(err) => log_warn!("camera access not available: {err}"),
        }
    }

    log_info!("device capabilities: {snapshot:?}");
    snapshot
}
