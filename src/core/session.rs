use crate::camera::VideoSource;
use crate::core::instruction::{Instruction, Pose};
use crate::core::sampler::{FrameSampler, SampleOutcome};
use crate::core::selector::select_frames;
use crate::core::sequencer::{InstructionSequencer, SequencerStep};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureStatus {
    Idle,
    Countdown,
    Capturing,
    Completed,
}

impl Default for CaptureStatus {
    fn default() -> Self {
        CaptureStatus::Idle
    }
}

/// Monotonic tag distinguishing one capture attempt from the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

/// A buffered snapshot together with when, and under which prompt, it was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame<F> {
    pub frame: F,
    pub pose: Pose,
    pub offset_ms: u64,
    pub sequence: usize,
}

/// Append-only frame store for one session.
#[derive(Debug, Clone)]
pub struct FrameBuffer<F> {
    frames: Vec<CapturedFrame<F>>,
}

impl<F> FrameBuffer<F> {
    fn new() -> Self {
        Self { frames: Vec::new() }
    }

    fn push(&mut self, frame: F, pose: Pose, offset_ms: u64) {
        let sequence = self.frames.len();
        self.frames.push(CapturedFrame {
            frame,
            pose,
            offset_ms,
            sequence,
        });
    }

    pub fn as_slice(&self) -> &[CapturedFrame<F>] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionTick {
    Running,
    Completed,
    Inert,
}

/// State of one capture run, from the end of the countdown to completion.
#[derive(Debug)]
pub struct CaptureSession<F> {
    generation: Generation,
    status: CaptureStatus,
    elapsed_ms: u64,
    sequencer: InstructionSequencer,
    sampler: FrameSampler,
    buffer: FrameBuffer<F>,
    selected: Vec<CapturedFrame<F>>,
    target_count: usize,
}

impl<F: Clone> CaptureSession<F> {
    pub(crate) fn new(
        generation: Generation,
        instructions: Arc<[Instruction]>,
        cadence_ms: u64,
        target_count: usize,
    ) -> Self {
        Self {
            generation,
            status: CaptureStatus::Capturing,
            elapsed_ms: 0,
            sequencer: InstructionSequencer::new(instructions),
            sampler: FrameSampler::new(cadence_ms),
            buffer: FrameBuffer::new(),
            selected: Vec::new(),
            target_count,
        }
    }

    /// Sampling runs before instruction advancement so a frame due on the
    /// same tick as a boundary is still taken, under the outgoing prompt.
    pub(crate) fn tick<S>(&mut self, delta_ms: u64, source: &mut S) -> SessionTick
    where
        S: VideoSource<Frame = F> + ?Sized,
    {
        if self.status != CaptureStatus::Capturing {
            return SessionTick::Inert;
        }

        self.elapsed_ms = self.elapsed_ms.saturating_add(delta_ms);

        if let SampleOutcome::Captured(frame) = self.sampler.poll(delta_ms, source) {
            let pose = self
                .sequencer
                .current_instruction()
                .map(|i| i.pose)
                .unwrap_or(Pose::Center);
            self.buffer.push(frame, pose, self.elapsed_ms);
        }

        match self.sequencer.advance(delta_ms) {
            SequencerStep::Holding => SessionTick::Running,
            SequencerStep::Advanced(index) => {
                tracing::debug!(
                    "Session {} moved to instruction {} at {}ms",
                    self.generation.0, index, self.elapsed_ms
                );
                SessionTick::Running
            }
            SequencerStep::Exhausted | SequencerStep::Inert => {
                self.complete();
                SessionTick::Completed
            }
        }
    }

    fn complete(&mut self) {
        self.selected = select_frames(self.buffer.as_slice(), self.target_count);
        self.status = CaptureStatus::Completed;
        tracing::info!(
            "Session {} completed: {} frames captured, {} selected ({} misses)",
            self.generation.0,
            self.buffer.len(),
            self.selected.len(),
            self.sampler.misses()
        );
    }
}

impl<F> CaptureSession<F> {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn current_instruction_index(&self) -> usize {
        self.sequencer.current_index()
    }

    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.sequencer.current_instruction()
    }

    pub fn progress_fraction(&self) -> f32 {
        self.sequencer.progress_fraction()
    }

    pub fn frame_buffer(&self) -> &FrameBuffer<F> {
        &self.buffer
    }

    /// Empty until the session completes.
    pub fn selected_frames(&self) -> &[CapturedFrame<F>] {
        &self.selected
    }

    pub fn capture_attempts(&self) -> u32 {
        self.sampler.attempts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::from_fn;

    fn instructions() -> Arc<[Instruction]> {
        vec![
            Instruction::new(Pose::Left, "left", 200),
            Instruction::new(Pose::Right, "right", 200),
        ]
        .into()
    }

    #[test]
    fn frames_are_tagged_with_active_pose() {
        let mut session = CaptureSession::new(Generation(1), instructions(), 100, 10);
        let mut n = 0u32;
        let mut source = from_fn(|| {
            n += 1;
            Some(n)
        });

        while session.tick(50, &mut source) == SessionTick::Running {}

        let poses: Vec<Pose> = session.frame_buffer().as_slice().iter().map(|f| f.pose).collect();
        assert_eq!(poses, vec![Pose::Left, Pose::Left, Pose::Right, Pose::Right]);
        let offsets: Vec<u64> = session.frame_buffer().as_slice().iter().map(|f| f.offset_ms).collect();
        assert_eq!(offsets, vec![100, 200, 300, 400]);
        assert_eq!(session.status(), CaptureStatus::Completed);
        assert_eq!(session.selected_frames().len(), 4);
    }

    #[test]
    fn completed_session_stops_appending() {
        let mut session = CaptureSession::new(Generation(1), instructions(), 100, 10);
        let mut source = from_fn(|| Some(()));

        while session.tick(100, &mut source) == SessionTick::Running {}
        let captured = session.frame_buffer().len();

        assert_eq!(session.tick(100, &mut source), SessionTick::Inert);
        assert_eq!(session.frame_buffer().len(), captured);
        assert_eq!(session.progress_fraction(), 1.0);
    }
}
