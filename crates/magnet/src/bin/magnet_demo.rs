//! # MAGNET Demo
//!
//! Headless run of the frame pipeline over a scene of spinning objects.
//!
//! Usage: `magnet_demo [config.toml] [frames]`

use std::sync::Arc;
use std::time::{Duration, Instant};

use magnet::render::{GeometryHandle, HeadlessDevice};
use magnet::{AppResult, Application, EngineConfig, OrbitCamera, Scene, SpinningObject};

const DEFAULT_FRAMES: u64 = 600;
const SHADERS: [&str; 3] = ["lit_metal", "lit_stone", "unlit_glow"];

fn main() {
    if let Err(err) = run() {
        eprintln!("magnet_demo: {err}");
        std::process::exit(1);
    }
}

fn run() -> AppResult<()> {
    magnet::logging::init_logging()?;

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let frames = args.next().and_then(|n| n.parse().ok()).unwrap_or(DEFAULT_FRAMES);

    let device = Arc::new(HeadlessDevice::new());
    let app_device: Arc<dyn magnet::render::GpuDevice> = device.clone();
    let mut app = Application::start(&config, app_device, build_scene())?;

    let started = Instant::now();
    let mut frame_times = Vec::new();
    while app.update_frame_count() < frames {
        app.run_frame()?;
        frame_times.extend(app.drain_reports().into_iter().map(|r| r.duration));
    }
    let elapsed = started.elapsed();
    frame_times.extend(app.drain_reports().into_iter().map(|r| r.duration));

    let report = app.shutdown()?;

    let worst = frame_times.iter().max().copied().unwrap_or(Duration::ZERO);
    println!("frames updated:   {}", report.frames_updated);
    println!("frames rendered:  {}", report.frames_rendered);
    println!("draw calls:       {}", report.render.draw_calls);
    println!("draws per frame:  {:.1}", report.render.draw_calls_per_frame());
    println!("tasks completed:  {}", report.tasks.completed);
    println!("tasks helped:     {}", report.orchestrator.helped);
    println!("tasks dropped:    {}", report.tasks_dropped);
    println!("update failures:  {}", report.orchestrator.update_failures);
    println!("presents:         {}", device.present_count());
    println!("worst frame:      {worst:?}");
    println!(
        "throughput:       {:.0} frames/s",
        report.frames_rendered as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    Ok(())
}

fn build_scene() -> Scene {
    let mut scene = Scene::new();
    scene.add(OrbitCamera::new(40.0, 16.0 / 9.0));

    for i in 0..48u64 {
        let shader = SHADERS[(i % SHADERS.len() as u64) as usize];
        let ring = (i / 12) as f32;
        let angle = (i % 12) as f32 * std::f32::consts::TAU / 12.0;
        let object = SpinningObject::new(format!("object-{i:02}"), shader, GeometryHandle::new(i % 4, 12 + 4 * i as u32))
            .at([angle.cos() * (8.0 + ring * 6.0), ring * 2.0, angle.sin() * (8.0 + ring * 6.0)])
            .spinning(0.01 + 0.002 * i as f32)
            .tinted([0.4 + 0.1 * ring, 0.6, 1.0 - 0.1 * ring, 1.0]);
        scene.add(object);
    }
    scene
}
