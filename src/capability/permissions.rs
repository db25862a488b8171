use std::time::Duration;

use crate::platform::{
    PermissionName, PermissionStatus, Platform, PositionOptions, VideoConstraints,
};

use super::{PermissionReport, PermissionState};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

impl From<PermissionStatus> for PermissionState {
    fn from(status: PermissionStatus) -> Self {
        match status {
            PermissionStatus::Granted => PermissionState::Granted,
            PermissionStatus::Denied => PermissionState::Denied,
            PermissionStatus::Prompt => PermissionState::Unknown,
        }
    }
}

/// Resolve camera and geolocation permissions. Never fails: errors are
/// logged and reported as `Denied`, missing APIs as `Unknown`.
pub async fn negotiate(platform: &Platform, geo_options: &PositionOptions) -> PermissionReport {
    PermissionReport {
        camera: camera_permission(platform).await,
        geolocation: geolocation_permission(platform, geo_options).await,
    }
}

async fn camera_permission(platform: &Platform) -> PermissionState {
    if let Some(permissions) = &platform.permissions {
        return match permissions.query(PermissionName::Camera).await {
            Ok(status) => status.into(),
            Err(err) => {
                log_warn!("camera permission query failed: {err}");
                PermissionState::Denied
            }
        };
    }

    let Some(media) = &platform.media else {
        return PermissionState::Unknown;
    };
    match media.get_user_media(&VideoConstraints::any()).await {
        Ok(mut stream) => {
            stream.stop_tracks();
            PermissionState::Granted
        }
        Err(err) => {
            log_warn!("camera permission denied: {err}");
            PermissionState::Denied
        }
    }
}

async fn geolocation_permission(
    platform: &Platform,
    options: &PositionOptions,
) -> PermissionState {
    if let Some(permissions) = &platform.permissions {
        return match permissions.query(PermissionName::Geolocation).await {
            Ok(status) => status.into(),
            Err(err) => {
                log_warn!("geolocation permission query failed: {err}");
                PermissionState::Denied
            }
        };
    }

    let Some(geolocation) = &platform.geolocation else {
        return PermissionState::Unknown;
    };
    let timeout = Duration::from_millis(options.timeout_ms);
    match tokio::time::timeout(timeout, geolocation.current_position(options)).await {
        Ok(Ok(_)) => PermissionState::Granted,
        Ok(Err(err)) => {
            log_warn!("geolocation permission denied: {err}");
            PermissionState::Denied
        }
        Err(_) => {
            log_warn!("geolocation permission probe timed out after {}ms", options.timeout_ms);
            PermissionState::Denied
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::simulated::{SimulatedGeolocation, SimulatedPermissions, SimulatedPlatform};
    use crate::platform::{GeolocationError, MediaError, PermissionQueryError};
    use std::sync::Arc;

    #[tokio::test]
    async fn structured_query_maps_prompt_to_unknown() {
        let mut sim = SimulatedPlatform::new();
        sim.permissions = Some(Arc::new(
            SimulatedPermissions::all(PermissionStatus::Granted)
                .with(PermissionName::Geolocation, Ok(PermissionStatus::Prompt)),
        ));

        let report = negotiate(&sim.platform(), &PositionOptions::default()).await;
        assert_eq!(report.camera, PermissionState::Granted);
        assert_eq!(report.geolocation, PermissionState::Unknown);
        // the query path never touches the camera
        assert_eq!(sim.camera.acquired(), 0);
    }

    #[tokio::test]
    async fn query_errors_are_swallowed_as_denied() {
        let mut sim = SimulatedPlatform::new();
        sim.permissions = Some(Arc::new(SimulatedPermissions::all(PermissionStatus::Granted).with(
            PermissionName::Camera,
            Err(PermissionQueryError("camera is not a valid permission name".into())),
        )));

        let report = negotiate(&sim.platform(), &PositionOptions::default()).await;
        assert_eq!(report.camera, PermissionState::Denied);
        assert_eq!(report.geolocation, PermissionState::Granted);
    }

    #[tokio::test]
    async fn fallback_probes_devices_directly() {
        let sim = SimulatedPlatform::new().without_permissions_api();
        sim.camera.push_outcome(Err(MediaError::NotAllowed));

        let report = negotiate(&sim.platform(), &PositionOptions::default()).await;
        assert_eq!(report.camera, PermissionState::Denied);
        assert_eq!(report.geolocation, PermissionState::Granted);
        assert_eq!(sim.camera.open_streams(), 0);
    }

    #[tokio::test]
    async fn fallback_releases_granted_test_stream() {
        let sim = SimulatedPlatform::new().without_permissions_api();
        let report = negotiate(&sim.platform(), &PositionOptions::default()).await;
        assert_eq!(report.camera, PermissionState::Granted);
        assert_eq!(sim.camera.acquired(), 1);
        assert_eq!(sim.camera.released(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn geolocation_fallback_is_bounded() {
        let sim = SimulatedPlatform::new()
            .without_permissions_api()
            .with_geolocation(SimulatedGeolocation::never_resolves());
        let options = PositionOptions {
            timeout_ms: 500,
            ..PositionOptions::default()
        };

        let report = negotiate(&sim.platform(), &options).await;
        assert_eq!(report.geolocation, PermissionState::Denied);
    }

    #[tokio::test]
    async fn geolocation_fallback_failure_is_denied() {
        let sim = SimulatedPlatform::new()
            .without_permissions_api()
            .with_geolocation(SimulatedGeolocation::failing(GeolocationError::PermissionDenied));
        let report = negotiate(&sim.platform(), &PositionOptions::default()).await;
        assert_eq!(report.geolocation, PermissionState::Denied);
    }

    #[tokio::test]
    async fn missing_apis_are_unknown() {
        let report = negotiate(&Platform::default(), &PositionOptions::default()).await;
        assert_eq!(report, PermissionReport::default());
    }
}
