pub mod controller;
pub mod instruction;
pub mod sampler;
pub mod selector;
pub mod sequencer;
pub mod session;

pub use controller::{CaptureController, CapturePlan, CaptureSnapshot, CaptureTiming, TickHandle, TickOutcome};
pub use instruction::{default_instructions, Instruction, Pose};
pub use sampler::{FrameSampler, SampleOutcome};
pub use selector::{select_frames, select_indices};
pub use sequencer::{InstructionSequencer, SequencerStep};
pub use session::{CaptureSession, CaptureStatus, CapturedFrame, FrameBuffer, Generation};
