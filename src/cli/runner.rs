use crate::camera::VideoSource;
use crate::cli::preview::{check_for_escape, clear_screen, move_home, status_line, AsciiRenderer};
use crate::common::error::{EnrollError, Result};
use crate::core::controller::{CaptureController, TickOutcome};
use crossterm::terminal;
use image::DynamicImage;
use std::io::{self, Write};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEnd {
    Completed,
    Cancelled,
}

/// Keeps the terminal in raw mode for Esc handling; restores it on drop.
struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    fn enable() -> Self {
        match terminal::enable_raw_mode() {
            Ok(()) => Self { active: true },
            Err(e) => {
                tracing::warn!("Raw mode unavailable, Esc will not cancel: {}", e);
                Self { active: false }
            }
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = terminal::disable_raw_mode();
            let _ = crossterm::execute!(io::stdout(), crossterm::cursor::Show);
        }
    }
}

/// Next tick deadline. A deadline already missed (e.g. after a slow camera
/// read) is re-anchored to `now` so late ticks are not replayed back to back.
fn next_deadline(deadline: Instant, now: Instant, tick: Duration) -> Instant {
    if now > deadline {
        now + tick
    } else {
        deadline + tick
    }
}

/// Drive a capture in real time: one controller tick per `tick_ms`, with
/// the measured wall-clock delta. Esc resets the controller.
pub fn run_guided_capture<S>(
    controller: &mut CaptureController<DynamicImage>,
    source: &mut S,
    renderer: Option<&AsciiRenderer>,
) -> Result<CaptureEnd>
where
    S: VideoSource<Frame = DynamicImage> + ?Sized,
{
    let tick = Duration::from_millis(controller.plan().timing().tick_ms);
    let guard = RawModeGuard::enable();

    if renderer.is_some() {
        clear_screen().ok();
        crossterm::execute!(io::stdout(), crossterm::cursor::Hide).ok();
    }

    let handle = controller.start()?;
    let mut last = Instant::now();
    let mut deadline = last + tick;
    let mut last_status = String::new();

    let end = loop {
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        deadline = next_deadline(deadline, Instant::now(), tick);

        if guard.active && check_for_escape().unwrap_or(false) {
            controller.reset();
            break CaptureEnd::Cancelled;
        }

        let now = Instant::now();
        let delta_ms = now.duration_since(last).as_millis() as u64;
        last = now;

        let outcome = controller.on_tick(handle, delta_ms, source);

        let snapshot = controller.snapshot();
        match renderer {
            Some(renderer) => {
                let frame = controller.frame_buffer().last().map(|f| &f.frame);
                move_home().ok();
                print!("{}", renderer.render(frame, &snapshot));
                io::stdout().flush().ok();
            }
            None => {
                let line = status_line(&snapshot);
                if line != last_status {
                    print!("{}\r\n", line);
                    io::stdout().flush().ok();
                    last_status = line;
                }
            }
        }

        match outcome {
            TickOutcome::Completed { .. } => break CaptureEnd::Completed,
            TickOutcome::Stale | TickOutcome::Inert => {
                return Err(EnrollError::Other(anyhow::anyhow!(
                    "Capture session ended unexpectedly"
                )));
            }
            _ => {}
        }
    };

    drop(guard);
    println!();
    Ok(end)
}
