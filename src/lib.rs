pub mod core;
pub mod camera;
pub mod storage;
pub mod cli;
pub mod common;

// Re-export commonly used types
pub use common::{Config, DevMode, EnrollError, Result};
pub use crate::core::{
    select_frames, CaptureController, CapturePlan, CaptureSnapshot, CaptureStatus, CaptureTiming,
    CapturedFrame, Instruction, Pose, TickHandle, TickOutcome,
};
pub use camera::{SyntheticSource, VideoSource};
pub use storage::{EnrollmentRecord, EnrollmentStore, SubmissionPolicy};
