use guided_enroll::{
    camera::SyntheticSource,
    cli::{run_guided_capture, selection_summary, AsciiRenderer, CaptureEnd},
    common::{Config, DevMode},
    core::CaptureController,
    storage::{EnrollmentStore, ExportOptions, SubmissionPolicy},
};

use clap::{Parser, Subcommand};
use anyhow::Result;
use image::DynamicImage;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "guided-enroll")]
#[command(about = "Guided multi-pose face enrollment capture")]
struct Cli {
    /// Enable development mode (saves data locally for testing)
    #[arg(long, global = true)]
    dev: bool,

    /// Config file (defaults to configs/guided-enroll.toml, then the system path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the guided capture and save the selected frames
    Enroll {
        #[arg(short, long)]
        username: String,
        /// Use generated frames instead of the camera
        #[arg(long)]
        simulate: bool,
    },
    /// Show a saved enrollment
    Info {
        #[arg(short, long)]
        username: String,
    },
    /// Print the instruction sequence and timing
    ShowPlan,
    /// Capture a single test frame
    TestCamera,
    /// List cameras and the one auto-detection would pick
    DetectCamera,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.dev);

    let dev_mode = DevMode::new(cli.dev)?;
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Enroll { username, simulate } => {
            enroll(&username, simulate, &config, &dev_mode)?;
        }
        Commands::Info { username } => {
            let store = EnrollmentStore::new_with_dev_mode(&dev_mode, &config.storage)?;
            let record = store.load_record(&username)?;
            println!("User '{}' enrolled at {}", record.username, record.created_at);
            println!("{} frames kept of {} captured", record.frames.len(), record.frames_captured);
            for entry in &record.frames {
                println!("  {:<24} {:<7} {:>6}ms  {}", entry.file, entry.pose, entry.offset_ms,
                         entry.sha256.get(..12).unwrap_or(entry.sha256.as_str()));
            }
        }
        Commands::ShowPlan => show_plan(&config)?,
        Commands::TestCamera => test_camera(&config, &dev_mode)?,
        Commands::DetectCamera => detect_camera()?,
    }

    Ok(())
}

fn enroll(username: &str, simulate: bool, config: &Config, dev_mode: &DevMode) -> Result<()> {
    let store = EnrollmentStore::new_with_dev_mode(dev_mode, &config.storage)?;
    // Reject bad usernames before asking anyone to pose
    store.user_dir(username)?;

    let mut controller = CaptureController::new(config.capture_plan()?);
    let renderer = config.enrollment.enable_ascii_preview.then(|| {
        AsciiRenderer::new(config.enrollment.ascii_width, config.enrollment.ascii_height)
    });

    println!("Enrolling '{}': follow the prompts, Esc cancels", username);

    let end = if simulate {
        let mut source = SyntheticSource::new(config.camera.width, config.camera.height);
        run_guided_capture(&mut controller, &mut source, renderer.as_ref())?
    } else {
        capture_from_camera(&mut controller, config, renderer.as_ref())?
    };

    if end == CaptureEnd::Cancelled {
        println!("Capture cancelled, nothing saved");
        return Ok(());
    }

    let selected = controller.selected_frames();
    println!("{}", selection_summary(selected));

    SubmissionPolicy::new(config.enrollment.min_frames).check(selected.len())?;

    let record = store.save(
        username,
        selected,
        controller.frame_buffer().len(),
        ExportOptions::from(&config.enrollment),
    )?;
    println!("✓ Enrolled '{}' with {} frames in {}",
             username, record.frames.len(), store.root().join(username).display());
    Ok(())
}

#[cfg(feature = "v4l2")]
fn capture_from_camera(
    controller: &mut CaptureController<DynamicImage>,
    config: &Config,
    renderer: Option<&AsciiRenderer>,
) -> Result<CaptureEnd> {
    use guided_enroll::camera::Camera;

    // A missing camera degrades to an empty capture; the submission check reports it
    let camera = Camera::new(&config.camera)
        .map_err(|e| tracing::warn!("Camera unavailable: {}", e))
        .ok();
    let mut session = camera.as_ref().and_then(|c| {
        c.start_session()
            .map_err(|e| tracing::warn!("Could not start camera stream: {}", e))
            .ok()
    });

    Ok(run_guided_capture(controller, &mut session, renderer)?)
}

#[cfg(not(feature = "v4l2"))]
fn capture_from_camera(
    _controller: &mut CaptureController<DynamicImage>,
    _config: &Config,
    _renderer: Option<&AsciiRenderer>,
) -> Result<CaptureEnd> {
    anyhow::bail!("Built without camera support; use --simulate")
}

fn show_plan(config: &Config) -> Result<()> {
    let plan = config.capture_plan()?;
    let timing = plan.timing();

    println!("Countdown: {}s", timing.countdown_secs);
    for (i, instruction) in plan.instructions().iter().enumerate() {
        println!("  {}. {:<7} {:>5}ms  {}", i + 1, instruction.pose, instruction.duration_ms, instruction.prompt);
    }
    println!("Total: {}ms, tick {}ms, capture every {}ms (~{} attempts)",
             plan.total_duration_ms(),
             timing.tick_ms,
             timing.cadence_ms,
             plan.total_duration_ms() / timing.cadence_ms);
    println!("Keeping up to {} frames, at least {} required",
             plan.target_count(),
             config.enrollment.min_frames);
    Ok(())
}

#[cfg(feature = "v4l2")]
fn test_camera(config: &Config, dev_mode: &DevMode) -> Result<()> {
    use guided_enroll::camera::Camera;

    println!("Testing camera...");
    let camera = Camera::new(&config.camera)?;
    let frame = camera.capture_frame()?;

    let path = dev_mode.get_capture_path("test_camera");
    frame.save(&path)?;
    println!("✓ Captured {}x{} frame from /dev/video{}, saved to {}",
             frame.width(), frame.height(), camera.index(), path.display());
    Ok(())
}

#[cfg(not(feature = "v4l2"))]
fn test_camera(_config: &Config, _dev_mode: &DevMode) -> Result<()> {
    anyhow::bail!("Built without camera support")
}

#[cfg(feature = "v4l2")]
fn detect_camera() -> Result<()> {
    use guided_enroll::camera::Camera;

    println!("🔍 Detecting available cameras...\n");
    let cameras = Camera::list_all_cameras()?;
    if cameras.is_empty() {
        println!("❌ No cameras found!");
        println!("  Ensure you have permission to access /dev/video*");
        return Ok(());
    }

    for camera in &cameras {
        println!("📷 /dev/video{}: {}{}", camera.index, camera.name,
                 if camera.likely_ir { " (likely IR)" } else { "" });
        for feature in &camera.features {
            println!("   - {}", feature);
        }
    }

    let selected = Camera::detect_ir_camera()?;
    println!("\nAuto-detect (device_index = 999) would use /dev/video{}", selected);
    Ok(())
}

#[cfg(not(feature = "v4l2"))]
fn detect_camera() -> Result<()> {
    anyhow::bail!("Built without camera support")
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }
}
