//! Guided capture state machine.
//!
//! The controller is advanced by a single entry point, [`CaptureController::on_tick`],
//! fed with the time elapsed since the previous tick. It never sleeps or
//! spawns anything itself; whoever owns the clock drives it.
//!
//! ```text
//! Idle --start--> Countdown --(counter hits 0)--> Capturing --(sequence exhausted)--> Completed
//!   ^                 |                               |                                   |
//!   +-------------------------------- reset ---------------------------------------------+
//! ```
//!
//! Every `start` and `reset` bumps the session generation. Ticks carry the
//! [`TickHandle`] issued by `start`; a handle from an older generation is
//! rejected, so scheduled work from a discarded session cannot touch the
//! current one.

use crate::camera::VideoSource;
use crate::common::error::{EnrollError, Result};
use crate::core::instruction::{default_instructions, total_duration_ms, Instruction, Pose};
use crate::core::session::{CaptureSession, CaptureStatus, CapturedFrame, Generation, SessionTick};
use serde::Serialize;
use std::sync::Arc;

const MS_PER_COUNTDOWN_STEP: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTiming {
    /// Scheduler tick used to evaluate elapsed time.
    pub tick_ms: u64,
    /// Interval between capture attempts.
    pub cadence_ms: u64,
    /// Whole seconds counted down before capture begins.
    pub countdown_secs: u32,
}

impl Default for CaptureTiming {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            cadence_ms: 200,
            countdown_secs: 3,
        }
    }
}

/// Validated, immutable description of a capture run.
#[derive(Debug, Clone)]
pub struct CapturePlan {
    instructions: Arc<[Instruction]>,
    timing: CaptureTiming,
    target_count: usize,
}

impl CapturePlan {
    pub fn new(instructions: Vec<Instruction>, timing: CaptureTiming, target_count: usize) -> Result<Self> {
        if instructions.is_empty() {
            return Err(EnrollError::InvalidConfig("instruction list is empty".into()));
        }
        if target_count == 0 {
            return Err(EnrollError::InvalidConfig("target frame count must be at least 1".into()));
        }
        if timing.tick_ms == 0 {
            return Err(EnrollError::InvalidConfig("tick_ms must be positive".into()));
        }
        if timing.cadence_ms < timing.tick_ms {
            return Err(EnrollError::InvalidConfig(format!(
                "cadence_ms ({}) must not be finer than tick_ms ({})",
                timing.cadence_ms, timing.tick_ms
            )));
        }
        for (index, instruction) in instructions.iter().enumerate() {
            if instruction.duration_ms == 0 {
                return Err(EnrollError::InvalidConfig(format!(
                    "instruction {} ({}) has a zero duration",
                    index, instruction.pose
                )));
            }
            if instruction.duration_ms < timing.tick_ms {
                return Err(EnrollError::InvalidConfig(format!(
                    "instruction {} ({}) lasts {}ms, shorter than one {}ms tick",
                    index, instruction.pose, instruction.duration_ms, timing.tick_ms
                )));
            }
        }

        Ok(Self {
            instructions: instructions.into(),
            timing,
            target_count,
        })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn timing(&self) -> CaptureTiming {
        self.timing
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn total_duration_ms(&self) -> u64 {
        total_duration_ms(&self.instructions)
    }
}

impl Default for CapturePlan {
    fn default() -> Self {
        Self {
            instructions: default_instructions().into(),
            timing: CaptureTiming::default(),
            target_count: 10,
        }
    }
}

/// Ticket returned by [`CaptureController::start`]; ticks must present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickHandle {
    generation: Generation,
}

impl TickHandle {
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The handle belongs to a discarded session; nothing changed.
    Stale,
    /// Nothing to drive (idle, or the session already completed).
    Inert,
    Countdown { remaining_secs: u32 },
    CaptureStarted,
    Capturing { progress: f32 },
    Completed { selected: usize },
}

/// Read-only view of the controller for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSnapshot {
    pub generation: u64,
    pub status: CaptureStatus,
    pub countdown: Option<u32>,
    pub pose: Option<Pose>,
    pub prompt: Option<String>,
    pub progress_percent: u8,
    pub frames_captured: usize,
    pub frames_selected: usize,
}

#[derive(Debug, Clone, Copy)]
struct Countdown {
    remaining_secs: u32,
    carried_ms: u64,
}

pub struct CaptureController<F> {
    plan: CapturePlan,
    generation: Generation,
    status: CaptureStatus,
    countdown: Option<Countdown>,
    session: Option<CaptureSession<F>>,
}

impl<F: Clone> CaptureController<F> {
    pub fn new(plan: CapturePlan) -> Self {
        Self {
            plan,
            generation: Generation::default(),
            status: CaptureStatus::Idle,
            countdown: None,
            session: None,
        }
    }

    /// Begin a new cycle from `Idle` or `Completed`.
    pub fn start(&mut self) -> Result<TickHandle> {
        if matches!(self.status, CaptureStatus::Countdown | CaptureStatus::Capturing) {
            return Err(EnrollError::SessionActive);
        }

        self.generation = self.generation.next();
        self.session = None;

        let countdown_secs = self.plan.timing.countdown_secs;
        if countdown_secs == 0 {
            self.begin_capture();
        } else {
            self.countdown = Some(Countdown {
                remaining_secs: countdown_secs,
                carried_ms: 0,
            });
            self.status = CaptureStatus::Countdown;
        }

        tracing::info!(
            "Capture session {} started ({}s countdown, {} instructions, {}ms total)",
            self.generation.0,
            countdown_secs,
            self.plan.instructions.len(),
            self.plan.total_duration_ms()
        );

        Ok(TickHandle {
            generation: self.generation,
        })
    }

    pub fn on_tick<S>(&mut self, handle: TickHandle, delta_ms: u64, source: &mut S) -> TickOutcome
    where
        S: VideoSource<Frame = F> + ?Sized,
    {
        if handle.generation != self.generation {
            tracing::warn!(
                "Dropping tick for session {} (current is {})",
                handle.generation.0, self.generation.0
            );
            return TickOutcome::Stale;
        }

        match self.status {
            CaptureStatus::Idle | CaptureStatus::Completed => TickOutcome::Inert,
            CaptureStatus::Countdown => self.tick_countdown(delta_ms),
            CaptureStatus::Capturing => self.tick_capture(delta_ms, source),
        }
    }

    fn tick_countdown(&mut self, delta_ms: u64) -> TickOutcome {
        let remaining = match self.countdown.as_mut() {
            Some(countdown) => {
                countdown.carried_ms += delta_ms;
                while countdown.carried_ms >= MS_PER_COUNTDOWN_STEP && countdown.remaining_secs > 0 {
                    countdown.carried_ms -= MS_PER_COUNTDOWN_STEP;
                    countdown.remaining_secs -= 1;
                }
                countdown.remaining_secs
            }
            None => 0,
        };

        if remaining > 0 {
            return TickOutcome::Countdown {
                remaining_secs: remaining,
            };
        }

        self.begin_capture();
        TickOutcome::CaptureStarted
    }

    fn tick_capture<S>(&mut self, delta_ms: u64, source: &mut S) -> TickOutcome
    where
        S: VideoSource<Frame = F> + ?Sized,
    {
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Inert;
        };

        match session.tick(delta_ms, source) {
            SessionTick::Running => TickOutcome::Capturing {
                progress: session.progress_fraction(),
            },
            SessionTick::Completed => {
                self.status = CaptureStatus::Completed;
                TickOutcome::Completed {
                    selected: session.selected_frames().len(),
                }
            }
            SessionTick::Inert => TickOutcome::Inert,
        }
    }

    fn begin_capture(&mut self) {
        self.countdown = None;
        self.session = Some(CaptureSession::new(
            self.generation,
            self.plan.instructions.clone(),
            self.plan.timing.cadence_ms,
            self.plan.target_count,
        ));
        self.status = CaptureStatus::Capturing;
        tracing::debug!("Session {} capturing", self.generation.0);
    }
}

impl<F> CaptureController<F> {
    /// Return to `Idle` from any state, discarding the current session.
    /// Handles issued before the reset become stale.
    pub fn reset(&mut self) {
        let discarded = self.session.as_ref().map(|s| s.frame_buffer().len()).unwrap_or(0);
        tracing::info!(
            "Capture session {} reset from {:?}, {} buffered frames discarded",
            self.generation.0, self.status, discarded
        );

        self.generation = self.generation.next();
        self.status = CaptureStatus::Idle;
        self.countdown = None;
        self.session = None;
    }

    pub fn plan(&self) -> &CapturePlan {
        &self.plan
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Seconds left before capture starts, while counting down.
    pub fn countdown_value(&self) -> Option<u32> {
        self.countdown.map(|c| c.remaining_secs)
    }

    /// Prompt being shown during capture; `None` outside capture and once
    /// the sequence is exhausted.
    pub fn current_instruction(&self) -> Option<&Instruction> {
        match self.status {
            CaptureStatus::Capturing => self.session.as_ref()?.current_instruction(),
            _ => None,
        }
    }

    pub fn progress_fraction(&self) -> f32 {
        match (self.status, self.session.as_ref()) {
            (CaptureStatus::Completed, _) => 1.0,
            (CaptureStatus::Capturing, Some(session)) => session.progress_fraction(),
            _ => 0.0,
        }
    }

    pub fn session(&self) -> Option<&CaptureSession<F>> {
        self.session.as_ref()
    }

    pub fn frame_buffer(&self) -> &[CapturedFrame<F>] {
        self.session
            .as_ref()
            .map(|s| s.frame_buffer().as_slice())
            .unwrap_or(&[])
    }

    /// Frames chosen for enrollment; empty unless the session completed.
    pub fn selected_frames(&self) -> &[CapturedFrame<F>] {
        match (self.status, self.session.as_ref()) {
            (CaptureStatus::Completed, Some(session)) => session.selected_frames(),
            _ => &[],
        }
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        let instruction = self.current_instruction();
        CaptureSnapshot {
            generation: self.generation.0,
            status: self.status,
            countdown: self.countdown_value(),
            pose: instruction.map(|i| i.pose),
            prompt: instruction.map(|i| i.prompt.clone()),
            progress_percent: (self.progress_fraction() * 100.0).round() as u8,
            frames_captured: self.frame_buffer().len(),
            frames_selected: self.selected_frames().len(),
        }
    }
}
