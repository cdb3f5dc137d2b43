use crate::camera::VideoSource;

#[derive(Debug, PartialEq, Eq)]
pub enum SampleOutcome<F> {
    /// No cadence boundary crossed on this tick.
    NotDue,
    /// A boundary was crossed but the source had nothing to give.
    Missed,
    Captured(F),
}

/// Asks the video source for a frame each time capture time crosses a
/// cadence boundary. Boundaries are evaluated once per tick; if a single
/// tick jumps over several boundaries only one attempt is made.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    cadence_ms: u64,
    elapsed_ms: u64,
    next_boundary_ms: u64,
    attempts: u32,
    misses: u32,
}

impl FrameSampler {
    pub fn new(cadence_ms: u64) -> Self {
        let cadence_ms = cadence_ms.max(1);
        Self {
            cadence_ms,
            elapsed_ms: 0,
            next_boundary_ms: cadence_ms,
            attempts: 0,
            misses: 0,
        }
    }

    pub fn poll<S: VideoSource + ?Sized>(&mut self, delta_ms: u64, source: &mut S) -> SampleOutcome<S::Frame> {
        self.elapsed_ms = self.elapsed_ms.saturating_add(delta_ms);
        if self.elapsed_ms < self.next_boundary_ms {
            return SampleOutcome::NotDue;
        }

        // Skip any boundaries this tick jumped over
        while self.next_boundary_ms <= self.elapsed_ms {
            self.next_boundary_ms += self.cadence_ms;
        }

        self.attempts += 1;
        match source.try_snapshot() {
            Some(frame) => SampleOutcome::Captured(frame),
            None => {
                self.misses += 1;
                tracing::debug!(
                    "Capture miss at {}ms ({} of {} attempts)",
                    self.elapsed_ms, self.misses, self.attempts
                );
                SampleOutcome::Missed
            }
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }
}
