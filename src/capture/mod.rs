pub mod coordinator;
pub mod hud;
pub mod payload;

pub use coordinator::{CaptureCoordinator, CaptureRequest, ReportIntake};
pub use hud::{HudSnapshot, STATUS_DETECTED, STATUS_SCANNING};
pub use payload::CapturePayload;
