use crate::core::controller::CaptureSnapshot;
use crate::core::session::{CaptureStatus, CapturedFrame};
use image::DynamicImage;
use std::io::{self, Write};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent},
    terminal::{self, ClearType},
    cursor,
};

const ASCII_RAMP: &str = " .·:;+=xX#@";
const DEFAULT_WIDTH: usize = 80;
const DEFAULT_HEIGHT: usize = 30;
const PROGRESS_BAR_CELLS: usize = 20;
const STRIP_PREVIEW_COUNT: usize = 5;

/// Terminal rendering of the guided capture: camera preview, prompt,
/// countdown and progress.
pub struct AsciiRenderer {
    width: usize,
    height: usize,
}

impl AsciiRenderer {
    pub fn new(width: Option<usize>, height: Option<usize>) -> Self {
        let (term_width, term_height) = terminal::size()
            .map(|(w, h)| (w as usize, h as usize))
            .unwrap_or((DEFAULT_WIDTH, DEFAULT_HEIGHT));

        // Half resolution keeps redraws cheap
        Self {
            width: width.unwrap_or((term_width / 2).min(DEFAULT_WIDTH / 2)).max(1),
            height: height.unwrap_or((term_height.saturating_sub(5) / 2).min(DEFAULT_HEIGHT / 2)).max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn render(&self, frame: Option<&DynamicImage>, snapshot: &CaptureSnapshot) -> String {
        let mut grid = match frame {
            Some(image) => self.image_to_ascii(image),
            None => vec![vec![' '; self.width]; self.height],
        };

        match snapshot.status {
            CaptureStatus::Countdown => {
                if let Some(remaining) = snapshot.countdown {
                    self.overlay_center_text(&mut grid, &format!("[ {} ]", remaining));
                }
            }
            CaptureStatus::Capturing => {
                self.draw_face_guide(&mut grid);
                if let Some(prompt) = &snapshot.prompt {
                    self.overlay_text(&mut grid, prompt, self.width / 2, 1);
                }
            }
            CaptureStatus::Completed => self.overlay_center_text(&mut grid, "Complete!"),
            CaptureStatus::Idle => {}
        }

        let mut out = self.grid_to_string(&grid);
        out.push_str("\r\n");
        out.push_str(&status_line(snapshot));
        out
    }

    fn image_to_ascii(&self, image: &DynamicImage) -> Vec<Vec<char>> {
        let mut grid = vec![vec![' '; self.width]; self.height];
        let ramp: Vec<char> = ASCII_RAMP.chars().collect();

        let gray = image.to_luma8();
        let (img_width, img_height) = gray.dimensions();

        for term_y in 0..self.height {
            for term_x in 0..self.width {
                let img_x = (term_x as f32 / self.width as f32 * img_width as f32) as u32;
                let img_y = (term_y as f32 / self.height as f32 * img_height as f32) as u32;

                if img_x < img_width && img_y < img_height {
                    let brightness = gray.get_pixel(img_x, img_y)[0];
                    let char_idx = (brightness as usize * (ramp.len() - 1)) / 255;
                    grid[term_y][term_x] = ramp[char_idx];
                }
            }
        }

        grid
    }

    fn overlay_text(&self, grid: &mut [Vec<char>], text: &str, center_x: usize, y: usize) {
        if y >= self.height {
            return;
        }

        let start_x = center_x.saturating_sub(text.chars().count() / 2);
        for (i, ch) in text.chars().enumerate() {
            let x = start_x + i;
            if x < self.width {
                grid[y][x] = ch;
            }
        }
    }

    fn overlay_center_text(&self, grid: &mut [Vec<char>], text: &str) {
        self.overlay_text(grid, text, self.width / 2, self.height / 2);
    }

    /// Oval outline the face should sit in.
    fn draw_face_guide(&self, grid: &mut [Vec<char>]) {
        let cx = self.width as f32 / 2.0;
        let cy = self.height as f32 / 2.0;
        let rx = self.width as f32 * 0.22;
        let ry = self.height as f32 * 0.38;
        if rx < 1.0 || ry < 1.0 {
            return;
        }

        let steps = 72;
        for step in 0..steps {
            let theta = step as f32 / steps as f32 * std::f32::consts::TAU;
            let x = (cx + rx * theta.cos()).round() as isize;
            let y = (cy + ry * theta.sin()).round() as isize;
            if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
                grid[y as usize][x as usize] = 'o';
            }
        }
    }

    fn grid_to_string(&self, grid: &[Vec<char>]) -> String {
        grid.iter()
            .map(|row| row.iter().take(self.width).collect::<String>())
            .collect::<Vec<_>>()
            .join("\r\n")
    }
}

pub fn progress_bar(progress_percent: u8) -> String {
    let filled = (progress_percent.min(100) as usize * PROGRESS_BAR_CELLS) / 100;
    format!(
        "[{}{}]",
        "■".repeat(filled),
        "□".repeat(PROGRESS_BAR_CELLS - filled)
    )
}

pub fn status_line(snapshot: &CaptureSnapshot) -> String {
    match snapshot.status {
        CaptureStatus::Idle => "Press start to begin".to_string(),
        CaptureStatus::Countdown => format!(
            "Starting in {}... (Esc to cancel)",
            snapshot.countdown.unwrap_or(0)
        ),
        CaptureStatus::Capturing => format!(
            "{} Capturing face data... {}%",
            progress_bar(snapshot.progress_percent),
            snapshot.progress_percent
        ),
        CaptureStatus::Completed => format!(
            "{} {} frames selected from {} captured",
            progress_bar(100),
            snapshot.frames_selected,
            snapshot.frames_captured
        ),
    }
}

/// One-line summary of the selected frames: the first few poses, then a
/// count of the rest.
pub fn selection_summary<F>(selected: &[CapturedFrame<F>]) -> String {
    if selected.is_empty() {
        return "No frames selected".to_string();
    }

    let shown: Vec<String> = selected
        .iter()
        .take(STRIP_PREVIEW_COUNT)
        .map(|f| format!("#{}:{}", f.sequence, f.pose))
        .collect();

    let mut summary = format!("✅ {} frames ready [{}", selected.len(), shown.join(" "));
    if selected.len() > STRIP_PREVIEW_COUNT {
        summary.push_str(&format!(" +{}", selected.len() - STRIP_PREVIEW_COUNT));
    }
    summary.push(']');
    summary
}

pub fn clear_screen() -> io::Result<()> {
    crossterm::execute!(
        io::stdout(),
        terminal::Clear(ClearType::All),
        cursor::MoveTo(0, 0)
    )?;
    io::stdout().flush()
}

pub fn move_home() -> io::Result<()> {
    crossterm::execute!(io::stdout(), cursor::MoveTo(0, 0))
}

pub fn check_for_escape() -> io::Result<bool> {
    if event::poll(std::time::Duration::from_millis(0))? {
        if let Event::Key(KeyEvent { code, .. }) = event::read()? {
            return Ok(code == KeyCode::Esc);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instruction::Pose;

    fn snapshot(status: CaptureStatus) -> CaptureSnapshot {
        CaptureSnapshot {
            generation: 1,
            status,
            countdown: Some(2),
            pose: Some(Pose::Left),
            prompt: Some("Turn your head left".into()),
            progress_percent: 42,
            frames_captured: 13,
            frames_selected: 10,
        }
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0), format!("[{}]", "□".repeat(20)));
        assert_eq!(progress_bar(50), format!("[{}{}]", "■".repeat(10), "□".repeat(10)));
        assert_eq!(progress_bar(255), format!("[{}]", "■".repeat(20)));
    }

    #[test]
    fn status_line_per_state() {
        assert!(status_line(&snapshot(CaptureStatus::Countdown)).starts_with("Starting in 2"));
        assert!(status_line(&snapshot(CaptureStatus::Capturing)).ends_with("Capturing face data... 42%"));
        assert!(status_line(&snapshot(CaptureStatus::Completed)).contains("10 frames selected from 13"));
    }

    #[test]
    fn summary_truncates_after_five() {
        let frames: Vec<CapturedFrame<()>> = (0..7)
            .map(|i| CapturedFrame { frame: (), pose: Pose::Center, offset_ms: 0, sequence: i })
            .collect();
        let summary = selection_summary(&frames);
        assert!(summary.starts_with("✅ 7 frames ready"));
        assert!(summary.ends_with(" +2]"));
        assert_eq!(selection_summary::<()>(&[]), "No frames selected");
    }

    #[test]
    fn render_places_prompt_and_status() {
        let renderer = AsciiRenderer::new(Some(40), Some(10));
        let out = renderer.render(None, &snapshot(CaptureStatus::Capturing));
        let lines: Vec<&str> = out.split("\r\n").collect();
        assert_eq!(lines.len(), 11);
        assert!(lines[1].contains("Turn your head left"));
        assert!(lines[10].contains("42%"));
    }
}
