use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::platform::MediaError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    PermissionDenied,
    NoDevice,
    Unsupported,
    Other,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::PermissionDenied => "permission-denied",
            FailureReason::NoDevice => "no-device",
            FailureReason::Unsupported => "unsupported",
            FailureReason::Other => "other",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(rename_all = "camelCase")]
#[error("{reason}: {detail}")]
pub struct CameraFailure {
    pub reason: FailureReason,
    pub detail: String,
}

impl CameraFailure {
    pub fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    pub fn from_media_error(err: &MediaError) -> Self {
        let reason = match err {
            MediaError::NotAllowed | MediaError::Security => FailureReason::PermissionDenied,
            MediaError::NotFound | MediaError::Overconstrained(_) => FailureReason::NoDevice,
            MediaError::NotSupported => FailureReason::Unsupported,
            MediaError::NotReadable
            | MediaError::Aborted
            | MediaError::Playback(_)
            | MediaError::Other(_) => FailureReason::Other,
        };
        Self::new(reason, err.to_string())
    }

    pub fn prompt(&self) -> ErrorPrompt {
        let (title, message) = match self.reason {
            FailureReason::PermissionDenied => (
                "Camera permission denied",
                "Camera access is required for AR features. Please enable camera permissions and try again.",
            ),
            FailureReason::NoDevice => (
                "No camera found",
                "No usable camera was found on this device. Connect a camera or use the standard report form.",
            ),
            FailureReason::Unsupported => (
                "Camera not supported",
                "This browser cannot stream video. Use a secure (https) page on a supported browser.",
            ),
            FailureReason::Other => (
                "Camera unavailable",
                "The camera could not be started. It may be in use by another application.",
            ),
        };
        ErrorPrompt {
            title,
            message,
            actions: [PromptAction::Retry, PromptAction::Cancel],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PromptAction {
    Retry,
    Cancel,
}

/// User-facing error card. Every failure offers both retry and cancel.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPrompt {
    pub title: &'static str,
    pub message: &'static str,
    pub actions: [PromptAction; 2],
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CameraSessionState {
    #[default]
    Idle,
    Requesting,
    Streaming,
    Error(CameraFailure),
}

impl CameraSessionState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, CameraSessionState::Streaming)
    }

    pub fn failure(&self) -> Option<&CameraFailure> {
        match self {
            CameraSessionState::Error(failure) => Some(failure),
            _ => None,
        }
    }
}
