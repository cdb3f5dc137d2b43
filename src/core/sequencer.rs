use crate::core::instruction::{total_duration_ms, Instruction};
use std::sync::Arc;

/// Result of feeding one tick to the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerStep {
    /// Still inside the current instruction.
    Holding,
    /// Moved on to the instruction at this index.
    Advanced(usize),
    /// The last instruction just finished.
    Exhausted,
    /// Already exhausted before this tick; nothing changed.
    Inert,
}

/// Walks the instruction list as tick time accumulates.
///
/// Overshoot past an instruction boundary is dropped rather than carried
/// into the next instruction, so drift is bounded by one tick per
/// instruction.
#[derive(Debug, Clone)]
pub struct InstructionSequencer {
    instructions: Arc<[Instruction]>,
    index: usize,
    within_ms: u64,
    completed_ms: u64,
    total_ms: u64,
}

impl InstructionSequencer {
    pub fn new(instructions: Arc<[Instruction]>) -> Self {
        let total_ms = total_duration_ms(&instructions);
        Self {
            instructions,
            index: 0,
            within_ms: 0,
            completed_ms: 0,
            total_ms,
        }
    }

    /// Active instruction, or `None` once the list is exhausted.
    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.instructions.get(self.index)
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.instructions.len()
    }

    pub fn elapsed_in_current_ms(&self) -> u64 {
        self.within_ms
    }

    /// Fraction of the whole sequence already covered, in `[0, 1]`.
    pub fn progress_fraction(&self) -> f32 {
        if self.is_exhausted() || self.total_ms == 0 {
            return 1.0;
        }
        let done = self.completed_ms + self.within_ms;
        (done as f64 / self.total_ms as f64).clamp(0.0, 1.0) as f32
    }

    pub fn advance(&mut self, delta_ms: u64) -> SequencerStep {
        let duration = match self.current_instruction() {
            Some(instruction) => instruction.duration_ms,
            None => return SequencerStep::Inert,
        };

        self.within_ms = self.within_ms.saturating_add(delta_ms);
        if self.within_ms < duration {
            return SequencerStep::Holding;
        }

        self.completed_ms += duration;
        self.within_ms = 0;
        self.index += 1;

        if self.is_exhausted() {
            SequencerStep::Exhausted
        } else {
            SequencerStep::Advanced(self.index)
        }
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.within_ms = 0;
        self.completed_ms = 0;
    }
}
