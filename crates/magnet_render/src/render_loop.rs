//! # Render Loop
//!
//! The dedicated render thread.
//!
//! ```text
//!            begin_rendering()             stop_rendering()
//! ┌─────────┐ ───────────────> ┌───────────┐ ───────────────> ┌─────────┐
//! │ WAITING │                  │ RENDERING │                  │ STOPPED │
//! └─────────┘ ─────────────────┴───────────┴────────────────> └─────────┘
//!                          stop_rendering()
//! ```
//!
//! While RENDERING, each iteration waits (at most one poll interval) for
//! the update counter to move ahead of the render counter, then runs every
//! pass over the read slots, presents, publishes a [`FrameReport`] and
//! advances the render counter. A stop request wins over everything else
//! and is noticed within one poll interval.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use magnet_core::FrameSynchronizer;
use parking_lot::{Condvar, Mutex};

use crate::error::{RenderError, RenderResult};
use crate::pass::RenderPass;
use crate::registry::SubmissionRegistry;
use crate::stats::{FrameReport, RenderStats};
use crate::view::SharedView;

/// Render loop configuration.
#[derive(Debug, Clone)]
pub struct RenderLoopConfig {
    /// Longest single wait before re-checking state and counters.
    pub poll_interval: Duration,
    /// Frame reports buffered before new ones are dropped.
    pub report_capacity: usize,
    /// Passes run each frame, in order.
    pub passes: Vec<RenderPass>,
    /// Render thread name.
    pub thread_name: String,
}

impl Default for RenderLoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5),
            report_capacity: 128,
            passes: RenderPass::ALL.to_vec(),
            thread_name: "magnet-render".to_string(),
        }
    }
}

/// Lifecycle state of the render thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Started, not yet allowed to render.
    Waiting,
    /// Rendering frames as they become ready.
    Rendering,
    /// Told to stop; the thread exits or has exited.
    Stopped,
}

struct Control {
    state: Mutex<RenderState>,
    changed: Condvar,
}

/// Cloneable handle that drives the render thread's state.
#[derive(Clone)]
pub struct RenderController {
    control: Arc<Control>,
}

impl RenderController {
    fn new() -> Self {
        Self {
            control: Arc::new(Control {
                state: Mutex::new(RenderState::Waiting),
                changed: Condvar::new(),
            }),
        }
    }

    /// Moves WAITING to RENDERING. Returns false in any other state.
    pub fn begin_rendering(&self) -> bool {
        let mut state = self.control.state.lock();
        if *state != RenderState::Waiting {
            return false;
        }
        *state = RenderState::Rendering;
        self.control.changed.notify_all();
        tracing::info!("rendering begun");
        true
    }

    /// Moves to STOPPED from any state.
    pub fn stop_rendering(&self) {
        let mut state = self.control.state.lock();
        if *state != RenderState::Stopped {
            *state = RenderState::Stopped;
            self.control.changed.notify_all();
            tracing::info!("rendering stop requested");
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> RenderState {
        *self.control.state.lock()
    }

    /// Parks for at most `timeout` while WAITING, returning the state seen
    /// on wake-up.
    fn wait_while_waiting(&self, timeout: Duration) -> RenderState {
        let mut state = self.control.state.lock();
        if *state == RenderState::Waiting {
            let _ = self.control.changed.wait_for(&mut state, timeout);
        }
        *state
    }
}

impl std::fmt::Debug for RenderController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderController").field("state", &self.state()).finish()
    }
}

/// State the render thread reads.
#[derive(Debug, Clone)]
pub struct RenderShared {
    /// Submission groups; also supplies the device.
    pub registry: Arc<SubmissionRegistry>,
    /// Camera and light data.
    pub view: Arc<SharedView>,
    /// Frame counters.
    pub sync: Arc<FrameSynchronizer>,
}

/// Owner of the render thread.
pub struct RenderLoop {
    controller: RenderController,
    thread: Option<JoinHandle<RenderStats>>,
    reports: Receiver<FrameReport>,
}

impl RenderLoop {
    /// Spawns the render thread in the WAITING state.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ThreadSpawn`] if the thread cannot be created.
    pub fn spawn(shared: RenderShared, config: RenderLoopConfig) -> RenderResult<Self> {
        let controller = RenderController::new();
        let (sender, reports) = crossbeam_channel::bounded(config.report_capacity);

        let thread_controller = controller.clone();
        let thread = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || render_main(&shared, &thread_controller, &config, &sender))
            .map_err(RenderError::ThreadSpawn)?;

        Ok(Self {
            controller,
            thread: Some(thread),
            reports,
        })
    }

    /// Returns a handle for driving the thread's state.
    #[must_use]
    pub fn controller(&self) -> RenderController {
        self.controller.clone()
    }

    /// See [`RenderController::begin_rendering`].
    pub fn begin_rendering(&self) -> bool {
        self.controller.begin_rendering()
    }

    /// See [`RenderController::stop_rendering`].
    pub fn stop_rendering(&self) {
        self.controller.stop_rendering();
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> RenderState {
        self.controller.state()
    }

    /// Returns the channel frame reports arrive on.
    #[must_use]
    pub fn reports(&self) -> &Receiver<FrameReport> {
        &self.reports
    }

    /// Returns true once the thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stops the thread if needed and joins it.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ThreadPanicked`] if the thread panicked.
    pub fn join(mut self) -> RenderResult<RenderStats> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> RenderResult<RenderStats> {
        self.controller.stop_rendering();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| RenderError::ThreadPanicked),
            None => Ok(RenderStats::default()),
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.stop_and_join();
        }
    }
}

impl std::fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("state", &self.state())
            .field("pending_reports", &self.reports.len())
            .finish()
    }
}

fn render_main(
    shared: &RenderShared,
    controller: &RenderController,
    config: &RenderLoopConfig,
    reports: &Sender<FrameReport>,
) -> RenderStats {
    let mut stats = RenderStats::default();
    tracing::info!("render thread waiting");

    loop {
        match controller.wait_while_waiting(config.poll_interval) {
            RenderState::Waiting => continue,
            RenderState::Stopped => break,
            RenderState::Rendering => {}
        }

        let render = shared.sync.render_count();
        if !shared.sync.wait_for_update(render) {
            continue;
        }
        if controller.state() == RenderState::Stopped {
            break;
        }

        let report = render_frame(shared, &config.passes, render + 1);
        stats.record(&report);
        match reports.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => stats.reports_dropped += 1,
            // Nobody listens any more; keep rendering until stopped.
            Err(TrySendError::Disconnected(_)) => {}
        }
        shared.sync.advance_render();
    }

    tracing::info!(
        frames = stats.frames,
        draw_calls = stats.draw_calls,
        skipped = stats.skipped,
        "render thread stopped"
    );
    stats
}

fn render_frame(shared: &RenderShared, passes: &[RenderPass], frame: u64) -> FrameReport {
    let _span = tracing::debug_span!("frame", frame).entered();
    let start = Instant::now();
    let view = *shared.view.read_handle();
    let device = shared.registry.device();

    let mut report = FrameReport {
        frame,
        ..FrameReport::default()
    };
    for pass in passes {
        report.absorb(pass.execute(device.as_ref(), &shared.registry, &view));
    }

    report.presented = match device.present(frame) {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(frame, error = %err, "present failed");
            false
        }
    };
    report.duration = start.elapsed();

    tracing::trace!(frame, draw_calls = report.draw_calls, "frame presented");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HeadlessDevice;
    use crate::submission::SubmissionLimits;

    fn shared() -> (Arc<HeadlessDevice>, RenderShared) {
        let device = Arc::new(HeadlessDevice::new());
        let shared = RenderShared {
            registry: Arc::new(SubmissionRegistry::new(device.clone(), SubmissionLimits::default())),
            view: Arc::new(SharedView::default()),
            sync: Arc::new(FrameSynchronizer::new(Duration::from_millis(1))),
        };
        (device, shared)
    }

    fn config() -> RenderLoopConfig {
        RenderLoopConfig {
            poll_interval: Duration::from_millis(2),
            thread_name: "test-render".to_string(),
            ..RenderLoopConfig::default()
        }
    }

    #[test]
    fn test_begin_only_from_waiting() {
        let (_device, shared) = shared();
        let render_loop = RenderLoop::spawn(shared, config()).unwrap();

        assert_eq!(render_loop.state(), RenderState::Waiting);
        assert!(render_loop.begin_rendering());
        assert!(!render_loop.begin_rendering());
        render_loop.stop_rendering();
        assert!(!render_loop.begin_rendering());
        assert_eq!(render_loop.state(), RenderState::Stopped);
        render_loop.join().unwrap();
    }

    #[test]
    fn test_renders_one_frame_per_update() {
        let (device, shared) = shared();
        let sync = Arc::clone(&shared.sync);
        let render_loop = RenderLoop::spawn(shared, config()).unwrap();
        render_loop.begin_rendering();

        for frame in 1..=3 {
            sync.wait_for_render(Some(Duration::from_secs(5))).unwrap();
            sync.advance_update();
            let report = render_loop.reports().recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(report.frame, frame);
            assert!(report.presented);
        }
        sync.wait_for_render(Some(Duration::from_secs(5))).unwrap();

        let stats = render_loop.join().unwrap();
        assert_eq!(stats.frames, 3);
        assert_eq!(device.present_count(), 3);
        assert_eq!(device.last_presented(), 3);
    }

    #[test]
    fn test_stop_while_rendering_exits() {
        let (device, shared) = shared();
        let render_loop = RenderLoop::spawn(shared, config()).unwrap();
        render_loop.begin_rendering();
        std::thread::sleep(Duration::from_millis(10));

        let stats = render_loop.join().unwrap();
        assert_eq!(stats.frames, 0);
        assert_eq!(device.present_count(), 0);
    }
}
