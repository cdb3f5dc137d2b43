use guided_enroll::camera::{from_fn, VideoSource};
use guided_enroll::core::{
    select_frames, CaptureController, CapturePlan, CaptureStatus, CaptureTiming, Instruction,
    InstructionSequencer, Pose, TickHandle, TickOutcome,
};

const TICK_MS: u64 = 50;

fn three_step_plan(countdown_secs: u32) -> CapturePlan {
    CapturePlan::new(
        vec![
            Instruction::new(Pose::Center, "Look straight ahead", 1000),
            Instruction::new(Pose::Left, "Turn your head left", 800),
            Instruction::new(Pose::Right, "Turn your head right", 800),
        ],
        CaptureTiming {
            tick_ms: TICK_MS,
            cadence_ms: 200,
            countdown_secs,
        },
        10,
    )
    .unwrap()
}

/// Source yielding 1, 2, 3, ... so every frame is distinguishable.
fn counting_source() -> impl VideoSource<Frame = u32> {
    let mut next = 0u32;
    from_fn(move || {
        next += 1;
        Some(next)
    })
}

/// Tick until the controller completes; returns the number of ticks spent capturing.
fn run_to_completion<S>(controller: &mut CaptureController<u32>, handle: TickHandle, source: &mut S) -> usize
where
    S: VideoSource<Frame = u32>,
{
    let mut capture_ticks = 0;
    for _ in 0..10_000 {
        match controller.on_tick(handle, TICK_MS, source) {
            TickOutcome::Capturing { .. } => capture_ticks += 1,
            TickOutcome::Completed { .. } => return capture_ticks + 1,
            TickOutcome::Countdown { .. } | TickOutcome::CaptureStarted => {}
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    panic!("capture never completed");
}

#[test]
fn end_to_end_three_instruction_capture() {
    let mut controller = CaptureController::new(three_step_plan(3));
    let mut source = counting_source();

    let handle = controller.start().unwrap();
    assert_eq!(controller.status(), CaptureStatus::Countdown);

    let capture_ticks = run_to_completion(&mut controller, handle, &mut source);

    // 2600ms of 50ms ticks
    assert_eq!(capture_ticks, 52);
    assert_eq!(controller.status(), CaptureStatus::Completed);

    let captured: Vec<u32> = controller.frame_buffer().iter().map(|f| f.frame).collect();
    assert_eq!(captured, (1..=13).collect::<Vec<_>>());

    // stride 1: the last three captures are dropped
    let selected: Vec<u32> = controller.selected_frames().iter().map(|f| f.frame).collect();
    assert_eq!(selected, (1..=10).collect::<Vec<_>>());

    let poses: Vec<Pose> = controller.frame_buffer().iter().map(|f| f.pose).collect();
    assert_eq!(&poses[..5], &[Pose::Center; 5]);
    assert_eq!(&poses[5..9], &[Pose::Left; 4]);
    assert_eq!(&poses[9..], &[Pose::Right; 4]);

    assert_eq!(controller.progress_fraction(), 1.0);
    assert!(controller.current_instruction().is_none());
}

#[test]
fn sequence_exhausts_after_total_duration() {
    let plan = three_step_plan(0);
    let mut sequencer = InstructionSequencer::new(plan.instructions().to_vec().into());

    let mut elapsed = 0;
    while !sequencer.is_exhausted() {
        sequencer.advance(TICK_MS);
        elapsed += TICK_MS;
        assert!(elapsed <= plan.total_duration_ms() + TICK_MS);
    }

    assert_eq!(elapsed, plan.total_duration_ms());
    assert_eq!(sequencer.progress_fraction(), 1.0);
    assert!(sequencer.current_instruction().is_none());
}

#[test]
fn coarse_ticks_still_terminate_within_one_tick_of_overshoot() {
    let plan = CapturePlan::new(
        vec![
            Instruction::new(Pose::Up, "Look up", 130),
            Instruction::new(Pose::Down, "Look down", 130),
        ],
        CaptureTiming { tick_ms: 100, cadence_ms: 100, countdown_secs: 0 },
        10,
    )
    .unwrap();
    let mut controller: CaptureController<u32> = CaptureController::new(plan);
    let mut source = counting_source();
    let handle = controller.start().unwrap();

    let mut ticks = 0;
    while controller.status() != CaptureStatus::Completed {
        controller.on_tick(handle, 100, &mut source);
        ticks += 1;
        assert!(ticks <= 4);
    }
    // each 130ms instruction takes two 100ms ticks, overshoot dropped
    assert_eq!(ticks, 4);
    assert_eq!(controller.session().unwrap().elapsed_ms(), 400);
}

#[test]
fn reset_discards_partial_capture() {
    let mut controller = CaptureController::new(three_step_plan(0));
    let mut source = counting_source();

    let old = controller.start().unwrap();
    for _ in 0..12 {
        controller.on_tick(old, TICK_MS, &mut source);
    }
    assert_eq!(controller.status(), CaptureStatus::Capturing);
    assert_eq!(controller.frame_buffer().len(), 3);

    controller.reset();
    assert_eq!(controller.status(), CaptureStatus::Idle);
    assert!(controller.frame_buffer().is_empty());
    assert!(controller.session().is_none());
    assert_eq!(controller.progress_fraction(), 0.0);

    let fresh = controller.start().unwrap();
    // a tick scheduled by the discarded session must not land on the new one
    assert_eq!(controller.on_tick(old, TICK_MS, &mut source), TickOutcome::Stale);
    assert!(controller.frame_buffer().is_empty());

    run_to_completion(&mut controller, fresh, &mut source);
    let frames: Vec<u32> = controller.frame_buffer().iter().map(|f| f.frame).collect();
    assert_eq!(frames.len(), 13);
    assert!(frames.iter().all(|f| *f > 3), "residual frames leaked: {:?}", frames);
}

#[test]
fn reset_during_countdown_invalidates_handle() {
    let mut controller = CaptureController::new(three_step_plan(3));
    let mut source = counting_source();

    let old = controller.start().unwrap();
    controller.on_tick(old, 1000, &mut source);
    assert_eq!(controller.countdown_value(), Some(2));

    controller.reset();
    assert_eq!(controller.countdown_value(), None);
    assert_eq!(controller.on_tick(old, 1000, &mut source), TickOutcome::Stale);
    assert_eq!(controller.status(), CaptureStatus::Idle);

    let fresh = controller.start().unwrap();
    assert_eq!(controller.countdown_value(), Some(3));
    assert_eq!(controller.on_tick(old, 3000, &mut source), TickOutcome::Stale);
    assert_eq!(controller.countdown_value(), Some(3));
    assert_eq!(controller.on_tick(fresh, 1000, &mut source), TickOutcome::Countdown { remaining_secs: 2 });
}

#[test]
fn silent_source_still_completes_on_schedule() {
    let mut controller: CaptureController<u32> = CaptureController::new(three_step_plan(0));
    let mut source = from_fn(|| None::<u32>);

    let handle = controller.start().unwrap();
    let capture_ticks = run_to_completion(&mut controller, handle, &mut source);

    assert_eq!(capture_ticks, 52);
    assert_eq!(controller.status(), CaptureStatus::Completed);
    assert!(controller.frame_buffer().is_empty());
    assert!(controller.selected_frames().is_empty());
    assert_eq!(controller.session().unwrap().capture_attempts(), 13);
}

#[test]
fn detached_source_behaves_like_silent_camera() {
    let mut controller: CaptureController<u32> = CaptureController::new(three_step_plan(0));
    let mut source: Option<Box<dyn VideoSource<Frame = u32>>> = None;

    let handle = controller.start().unwrap();
    run_to_completion(&mut controller, handle, &mut source);
    assert!(controller.selected_frames().is_empty());
}

#[test]
fn flaky_source_yields_fewer_frames() {
    let mut controller = CaptureController::new(three_step_plan(0));
    let mut attempt = 0u32;
    let mut source = from_fn(move || {
        attempt += 1;
        (attempt % 3 != 0).then_some(attempt)
    });

    let handle = controller.start().unwrap();
    run_to_completion(&mut controller, handle, &mut source);

    // attempts 3, 6, 9, 12 miss
    let frames: Vec<u32> = controller.frame_buffer().iter().map(|f| f.frame).collect();
    assert_eq!(frames, vec![1, 2, 4, 5, 7, 8, 10, 11, 13]);
    assert_eq!(controller.selected_frames().len(), 9);
}

#[test]
fn selector_examples() {
    let seven: Vec<u32> = (0..7).collect();
    assert_eq!(select_frames(&seven, 10), seven);

    let twenty_five: Vec<u32> = (0..25).collect();
    assert_eq!(select_frames(&twenty_five, 10), vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);

    let eleven: Vec<u32> = (0..11).collect();
    assert_eq!(select_frames(&eleven, 10), (0..10).collect::<Vec<_>>());
}

#[test]
fn snapshot_serializes_for_display() {
    let mut controller = CaptureController::new(three_step_plan(3));
    let mut source = counting_source();
    let handle = controller.start().unwrap();
    controller.on_tick(handle, 1000, &mut source);

    let json = serde_json::to_value(controller.snapshot()).unwrap();
    assert_eq!(json["status"], "countdown");
    assert_eq!(json["countdown"], 2);
    assert_eq!(json["progressPercent"], 0);
    assert!(json["prompt"].is_null());
}
