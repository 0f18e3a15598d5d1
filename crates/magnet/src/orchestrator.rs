//! # Frame Orchestrator
//!
//! The update thread's per-frame step.
//!
//! ```text
//! step()
//!   │
//!   ├─ task queued?            ── run one task here ─────────────> Helped
//!   │
//!   ├─ update == 0?            ── advance to 1, begin rendering ─> Bootstrapped
//!   │
//!   ├─ tasks still running?    ── wait one poll interval ────────> AwaitingWorkers
//!   │
//!   └─ wait for render == update (stall timeout)
//!        swap every group + view
//!        advance update
//!        one update task per scene object ───────────────────────> Advanced
//! ```
//!
//! Swapping happens before the update counter moves, and new tasks are
//! distributed only after both, so the renderer is released onto a slot
//! nobody writes to and the new tasks write only the fresh write slot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use magnet_core::{FrameSynchronizer, Task, TaskOutcome, TaskQueue};
use magnet_render::{RenderController, SharedView, SubmissionRegistry};

use crate::error::OrchestratorError;
use crate::scene::{Scene, UpdateContext};

/// What one [`FrameOrchestrator::step`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStep {
    /// Ran one queued task on the calling thread.
    Helped(TaskOutcome),
    /// Queue empty but tasks still executing on workers.
    AwaitingWorkers,
    /// First call: update counter set to 1 and rendering begun.
    Bootstrapped,
    /// Frame boundary crossed.
    Advanced {
        /// New update counter.
        frame: u64,
        /// Update tasks distributed for the new frame.
        tasks: usize,
    },
}

/// Lifetime counters of the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    /// Tasks run by the update thread itself.
    pub helped: u64,
    /// Update tasks distributed.
    pub distributed: u64,
    /// Updatable objects that returned an error.
    pub update_failures: u64,
    /// Frame boundaries crossed.
    pub frames_advanced: u64,
}

/// Everything the orchestrator drives.
#[derive(Debug, Clone)]
pub struct OrchestratorParts {
    /// Shared task queue.
    pub queue: Arc<TaskQueue>,
    /// Frame counters.
    pub sync: Arc<FrameSynchronizer>,
    /// Submission groups.
    pub registry: Arc<SubmissionRegistry>,
    /// Camera and light data.
    pub view: Arc<SharedView>,
    /// Handle for starting the render thread.
    pub render: RenderController,
}

/// Update-thread loop body.
#[derive(Debug)]
pub struct FrameOrchestrator {
    parts: OrchestratorParts,
    scene: Scene,
    stall_timeout: Option<Duration>,
    helped: u64,
    distributed: u64,
    frames_advanced: u64,
    update_failures: Arc<AtomicU64>,
}

impl FrameOrchestrator {
    /// Creates an orchestrator over `scene`.
    ///
    /// `stall_timeout` of `None` waits for the renderer forever.
    #[must_use]
    pub fn new(parts: OrchestratorParts, scene: Scene, stall_timeout: Option<Duration>) -> Self {
        Self {
            parts,
            scene,
            stall_timeout,
            helped: 0,
            distributed: 0,
            frames_advanced: 0,
            update_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the scene.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Returns lifetime counters.
    #[must_use]
    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            helped: self.helped,
            distributed: self.distributed,
            update_failures: self.update_failures.load(Ordering::Relaxed),
            frames_advanced: self.frames_advanced,
        }
    }

    /// Runs one orchestrator iteration.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Sync`] carrying
    /// [`magnet_core::CoreError::RenderStalled`] if the renderer did not catch
    /// up within the stall timeout. Nothing was swapped or advanced in that
    /// case; calling again resumes the wait.
    pub fn step(&mut self) -> Result<FrameStep, OrchestratorError> {
        if let Some(task) = self.parts.queue.try_dequeue() {
            self.helped += 1;
            return Ok(FrameStep::Helped(task.execute()));
        }

        if self.parts.sync.update_count() == 0 {
            self.parts.sync.advance_update();
            self.parts.render.begin_rendering();
            tracing::info!("bootstrap frame issued; rendering begun");
            return Ok(FrameStep::Bootstrapped);
        }

        if !self.parts.queue.is_idle() {
            let _ = self.parts.queue.wait_idle(self.parts.sync.poll_interval());
            return Ok(FrameStep::AwaitingWorkers);
        }

        self.parts.sync.wait_for_render(self.stall_timeout)?;

        self.parts.registry.swap_all();
        self.parts.view.swap_buffers();
        let frame = self.parts.sync.advance_update();
        let tasks = self.distribute(frame);
        self.frames_advanced += 1;

        tracing::debug!(frame, tasks, "frame advanced");
        Ok(FrameStep::Advanced { frame, tasks })
    }

    /// Steps until a frame boundary is crossed.
    ///
    /// # Errors
    ///
    /// As [`FrameOrchestrator::step`].
    pub fn run_frame(&mut self) -> Result<u64, OrchestratorError> {
        loop {
            if let FrameStep::Advanced { frame, .. } = self.step()? {
                return Ok(frame);
            }
        }
    }

    /// Enqueues one update task per scene object for `frame`.
    ///
    /// Returns how many were enqueued.
    pub fn distribute(&mut self, frame: u64) -> usize {
        let ctx = UpdateContext::new(frame, Arc::clone(&self.parts.registry), Arc::clone(&self.parts.view));

        for object in self.scene.objects() {
            let object = Arc::clone(object);
            let ctx = ctx.clone();
            let failures = Arc::clone(&self.update_failures);
            let label = object.name().to_string();

            self.parts.queue.enqueue(Task::labeled(label, move || {
                if let Err(err) = object.update(&ctx) {
                    failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(object = object.name(), frame = ctx.frame(), error = %err, "update failed");
                }
            }));
        }

        let count = self.scene.len();
        self.distributed += count as u64;
        count
    }
}
