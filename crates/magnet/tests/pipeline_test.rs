//! # Pipeline Verification Tests
//!
//! End-to-end runs of the application with real worker and render
//! threads over a headless device:
//!
//! 1. **Bootstrap**: the first step issues frame 1 without waiting
//! 2. **Frame boundary**: tasks of frame N are drawn in frame N+1, exactly
//! 3. **Helping**: without workers the update thread drains the queue
//! 4. **Lag**: update and render never drift more than one frame apart
//!
//! Run with: cargo test -p magnet --test pipeline_test -- --nocapture

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use magnet::core::TaskOutcome;
use magnet::render::{GeometryHandle, HeadlessDevice, RenderState};
use magnet::{
    Application, EngineConfig, FrameStep, OrbitCamera, Scene, SpinningObject, Updatable, UpdateContext, UpdateError,
};

fn config(workers: usize) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.workers.count = workers;
    config.workers.idle_poll_ms = 1;
    config.frame.render_poll_ms = 1;
    config.frame.render_stall_timeout_ms = 5_000;
    config
}

fn spinning_scene(names: &[&str], shader: &str) -> Scene {
    let mut scene = Scene::new();
    for name in names {
        scene.add(SpinningObject::new(*name, shader, GeometryHandle::new(1, 12)));
    }
    scene
}

fn start(workers: usize, scene: Scene) -> (Arc<HeadlessDevice>, Application) {
    let device = Arc::new(HeadlessDevice::new());
    let app = Application::start(&config(workers), device.clone(), scene).unwrap();
    (device, app)
}

fn wait_for_render(app: &Application, frame: u64) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while app.render_frame_count() < frame {
        assert!(Instant::now() < deadline, "renderer never reached frame {frame}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

// ============================================================================
// SCENARIO A: BOOTSTRAP
// ============================================================================

#[test]
fn test_bootstrap_begins_rendering_without_waiting() {
    let (device, mut app) = start(0, Scene::new());
    assert_eq!(app.update_frame_count(), 0);
    assert_eq!(app.render_state(), RenderState::Waiting);

    let called = Instant::now();
    assert_eq!(app.update().unwrap(), FrameStep::Bootstrapped);
    assert!(called.elapsed() < Duration::from_secs(1));

    assert_eq!(app.update_frame_count(), 1);
    assert_eq!(app.render_state(), RenderState::Rendering);

    wait_for_render(&app, 1);
    let report = app.shutdown().unwrap();
    assert_eq!(report.frames_rendered, 1);
    assert_eq!(device.present_count(), 1);
}

// ============================================================================
// SCENARIO B: FRAME BOUNDARY
// ============================================================================

#[test]
fn test_frame_tasks_are_drawn_exactly_next_frame() {
    let (device, mut app) = start(2, spinning_scene(&["a", "b", "c"], "lit"));

    while app.update_frame_count() < 5 {
        app.run_frame().unwrap();
    }
    wait_for_render(&app, 5);
    assert_eq!(app.synchronizer().snapshot().lag(), 0);
    device.take_draws();
    let _ = app.drain_reports();

    assert_eq!(app.run_frame().unwrap(), 6);
    wait_for_render(&app, 6);

    let draws = device.take_draws();
    assert_eq!(draws.len(), 3);
    let names: HashSet<_> = draws.into_iter().map(|d| d.name).collect();
    assert_eq!(names, HashSet::from(["a".to_string(), "b".to_string(), "c".to_string()]));

    let reports = app.drain_reports();
    let last = reports.last().unwrap();
    assert_eq!(last.frame, 6);
    assert_eq!(last.draw_calls, 3);

    app.shutdown().unwrap();
}

struct FrameRecorder {
    seen: Arc<Vec<AtomicUsize>>,
}

impl Updatable for FrameRecorder {
    fn name(&self) -> &str {
        "frame-recorder"
    }

    fn update(&self, ctx: &UpdateContext) -> Result<(), UpdateError> {
        self.seen[ctx.frame() as usize].fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn test_update_tasks_see_every_frame_once() {
    let seen: Arc<Vec<AtomicUsize>> = Arc::new((0..16).map(|_| AtomicUsize::new(0)).collect());
    let mut scene = Scene::new();
    scene.add(FrameRecorder { seen: Arc::clone(&seen) });
    let (_device, mut app) = start(2, scene);

    // Advancing to 6 requires every task of frames 1..=5 to have finished.
    while app.update_frame_count() < 6 {
        app.run_frame().unwrap();
    }

    let counts: Vec<usize> = seen.iter().map(|c| c.load(Ordering::Relaxed)).collect();
    assert_eq!(counts[0], 0);
    assert_eq!(&counts[1..=5], &[1, 1, 1, 1, 1]);

    app.shutdown().unwrap();
}

// ============================================================================
// SCENARIO C: HELPING WITHOUT WORKERS
// ============================================================================

#[test]
fn test_update_thread_drains_queue_alone() {
    let (_device, mut app) = start(0, Scene::new());
    let effects: Arc<Vec<AtomicUsize>> = Arc::new((0..10).map(|_| AtomicUsize::new(0)).collect());

    for i in 0..10 {
        let effects = Arc::clone(&effects);
        app.enqueue_task(move || {
            effects[i].fetch_add(1, Ordering::Relaxed);
        });
    }

    for _ in 0..10 {
        assert_eq!(app.update().unwrap(), FrameStep::Helped(TaskOutcome::Completed));
    }
    assert!(effects.iter().all(|e| e.load(Ordering::Relaxed) == 1));
    assert!(app.queue().is_idle());

    // Only now does the pipeline bootstrap.
    assert_eq!(app.update().unwrap(), FrameStep::Bootstrapped);
    let report = app.shutdown().unwrap();
    assert_eq!(report.orchestrator.helped, 10);
    assert_eq!(report.tasks.completed, 10);
}

// ============================================================================
// LAG INVARIANT UNDER LOAD
// ============================================================================

#[test]
fn test_lag_stays_within_one_frame() {
    let names: Vec<String> = (0..32).map(|i| format!("object-{i}")).collect();
    let mut scene = Scene::new();
    scene.add(OrbitCamera::new(30.0, 1.0));
    for (i, name) in names.iter().enumerate() {
        let shader = if i % 2 == 0 { "even" } else { "odd" };
        scene.add(SpinningObject::new(name.as_str(), shader, GeometryHandle::new(1, 12)));
    }
    let (_device, mut app) = start(4, scene);

    let done = Arc::new(AtomicBool::new(false));
    let watcher = {
        let sync = Arc::clone(app.synchronizer());
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            let mut worst = 0;
            while !done.load(Ordering::Acquire) {
                let counters = sync.snapshot();
                assert!(counters.render <= counters.update);
                worst = worst.max(counters.lag());
            }
            worst
        })
    };

    while app.update_frame_count() < 150 {
        app.run_frame().unwrap();
    }
    done.store(true, Ordering::Release);
    assert!(watcher.join().unwrap() <= 1);

    app.shutdown().unwrap();
}

// ============================================================================
// FULL RUN
// ============================================================================

#[test]
fn test_full_run_draws_every_object_every_frame() {
    const OBJECTS: u64 = 12;
    const FRAMES: u64 = 40;

    let names: Vec<String> = (0..OBJECTS).map(|i| format!("object-{i}")).collect();
    let mut scene = Scene::new();
    scene.add(OrbitCamera::new(25.0, 16.0 / 9.0));
    for (i, name) in names.iter().enumerate() {
        let shader = ["lit", "unlit", "glow"][i % 3];
        scene.add(SpinningObject::new(name.as_str(), shader, GeometryHandle::new(1, 12)));
    }
    let (device, mut app) = start(3, scene);

    while app.update_frame_count() < FRAMES {
        app.run_frame().unwrap();
    }
    wait_for_render(&app, FRAMES);

    assert_eq!(app.registry().len(), 3);
    assert!(device.last_view().is_some());
    let report = app.shutdown().unwrap();

    // The bootstrap frame has nothing to draw; every later frame draws all.
    assert_eq!(report.render.draw_calls, OBJECTS * (FRAMES - 1));
    assert_eq!(report.render.skipped, 0);
    assert_eq!(report.frames_rendered, FRAMES);
    assert_eq!(device.present_count(), FRAMES);
    assert_eq!(device.resources_created(), 3);
}

// ============================================================================
// FAILURE HANDLING
// ============================================================================

#[test]
fn test_unavailable_shader_only_loses_its_own_draws() {
    let device = Arc::new(HeadlessDevice::new());
    device.fail_resources_for("broken");

    let mut scene = spinning_scene(&["good-1", "good-2"], "fine");
    scene.add(SpinningObject::new("bad", "broken", GeometryHandle::new(1, 12)));
    let mut app = Application::start(&config(2), device.clone(), scene).unwrap();

    while app.update_frame_count() < 6 {
        app.run_frame().unwrap();
    }
    wait_for_render(&app, 6);

    let report = app.shutdown().unwrap();
    assert_eq!(report.render.draw_calls, 2 * 5);
    assert!(report.orchestrator.update_failures >= 5);
    assert!(device.draws().iter().all(|d| d.name != "bad"));
}

#[test]
fn test_panicking_task_does_not_stop_pipeline() {
    let (_device, mut app) = start(2, spinning_scene(&["a"], "lit"));
    app.enqueue_task(|| panic!("bad task"));

    while app.update_frame_count() < 5 {
        app.run_frame().unwrap();
    }

    let report = app.shutdown().unwrap();
    assert_eq!(report.tasks.panicked, 1);
    assert_eq!(report.frames_updated, 5);
}

#[test]
fn test_shutdown_drops_and_counts_queued_tasks() {
    let (_device, app) = start(0, Scene::new());
    for _ in 0..5 {
        app.enqueue_task(|| unreachable!("dropped before running"));
    }

    let report = app.shutdown().unwrap();
    assert_eq!(report.tasks_dropped, 5);
    assert_eq!(report.tasks.completed, 0);
}
