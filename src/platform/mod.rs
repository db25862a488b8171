//! Device platform seams.
//!
//! The capture pipeline never talks to hardware directly. Stream acquisition,
//! geolocation, permission queries, script injection and the 3D scene library
//! are reached through the traits below, so the host (a webview bridge, a
//! native camera stack, or [`simulated`] in tests) decides how they work.

pub mod simulated;

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoding::EncodedImage;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    #[default]
    Environment,
    User,
}

impl FacingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::Environment => "environment",
            FacingMode::User => "user",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const HD: Resolution = Resolution {
        width: 1280,
        height: 720,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::HD
    }
}

/// Video constraints for a stream request. `None` leaves the choice to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoConstraints {
    pub facing: Option<FacingMode>,
    pub ideal: Option<Resolution>,
}

impl VideoConstraints {
    /// Equivalent of `{ video: true }`.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn preferred(facing: FacingMode, ideal: Resolution) -> Self {
        Self {
            facing: Some(facing),
            ideal: Some(ideal),
        }
    }
}

/// Failures reported by the platform's media layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("permission to use the camera was denied")]
    NotAllowed,
    #[error("camera access blocked by security policy")]
    Security,
    #[error("no camera device found")]
    NotFound,
    #[error("constraints cannot be satisfied: {0}")]
    Overconstrained(String),
    #[error("camera is busy or unreadable")]
    NotReadable,
    #[error("media capture is not supported")]
    NotSupported,
    #[error("stream request aborted")]
    Aborted,
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: &VideoConstraints,
    ) -> Result<Box<dyn MediaStream>, MediaError>;
}

/// A live video stream. Holding one keeps the device's capture indicator on
/// until [`MediaStream::stop_tracks`] is called.
pub trait MediaStream: Send {
    fn id(&self) -> &str;

    fn resolution(&self) -> Resolution;

    /// Bind the stream to its display surface and start playback.
    fn play(&mut self) -> Result<(), MediaError>;

    /// Copy of the frame currently on screen, at native resolution.
    fn snapshot(&self) -> Result<RgbaImage, MediaError>;

    fn stop_tracks(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub max_age_ms: u64,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 10_000,
            max_age_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timed out waiting for a position fix")]
    Timeout,
}

#[async_trait]
pub trait Geolocation: Send + Sync {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Position, GeolocationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionName {
    Camera,
    Geolocation,
}

/// Raw answer of a structured permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Prompt,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("permission query failed: {0}")]
pub struct PermissionQueryError(pub String);

#[async_trait]
pub trait Permissions: Send + Sync {
    async fn query(&self, name: PermissionName) -> Result<PermissionStatus, PermissionQueryError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("script {src} failed to load: {reason}")]
pub struct ScriptError {
    pub src: String,
    pub reason: String,
}

/// Injects remote scripts into the host document.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Whether a script with this source is already present in the document.
    fn is_injected(&self, src: &str) -> bool;

    /// Inject the script and resolve once it has loaded.
    async fn inject(&self, src: &str) -> Result<(), ScriptError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("scene backend error: {0}")]
pub struct BackendError(pub String);

/// The external 3D/AR scene library, reduced to what the adapter needs.
#[async_trait]
pub trait SceneBackend: Send + Sync {
    fn mount(&self, markup: &str) -> Result<(), BackendError>;

    fn unmount(&self);

    /// Perspective screenshot of the mounted scene.
    async fn screenshot(&self) -> Result<EncodedImage, BackendError>;
}

/// Facts about the hosting page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostContext {
    pub protocol: String,
    pub hostname: String,
    pub user_agent: String,
}

impl HostContext {
    pub fn new(
        protocol: impl Into<String>,
        hostname: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            hostname: hostname.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// Device APIs available to a capture view. A `None` entry means the host
/// does not expose that API at all.
#[derive(Clone, Default)]
pub struct Platform {
    pub host: HostContext,
    pub media: Option<Arc<dyn MediaDevices>>,
    pub geolocation: Option<Arc<dyn Geolocation>>,
    pub permissions: Option<Arc<dyn Permissions>>,
}
