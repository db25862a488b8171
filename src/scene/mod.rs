//! Alternative capture front-end backed by an external AR scene library.

pub mod adapter;
pub mod loader;
pub mod markup;

use thiserror::Error;

use crate::platform::BackendError;

pub use adapter::{AFrameSceneAdapter, SceneStatus};
pub use loader::{LoadState, ScriptLoader};
pub use markup::SceneDescription;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("failed to load script {src}: {reason}")]
    ScriptLoad { src: String, reason: String },
    #[error("script {src} did not load within {timeout_ms}ms")]
    ScriptTimeout { src: String, timeout_ms: u64 },
    #[error("scene initialization was cancelled")]
    Cancelled,
    #[error("scene is not active")]
    NotReady,
    #[error(transparent)]
    Backend(#[from] BackendError),
}
