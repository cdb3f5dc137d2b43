pub mod preview;
pub mod runner;

pub use preview::{AsciiRenderer, clear_screen, check_for_escape, selection_summary, status_line};
pub use runner::{run_guided_capture, CaptureEnd};
