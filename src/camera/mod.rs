pub mod frame;
pub mod session;
pub mod state;

pub use frame::{Frame, FrameSource};
pub use session::CameraSession;
pub use state::{CameraFailure, CameraSessionState, ErrorPrompt, FailureReason, PromptAction};
