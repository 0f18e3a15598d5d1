//! # Application Context
//!
//! Owns every shared piece of the pipeline. Nothing here is global: two
//! applications in one process are fully independent.
//!
//! ```text
//! Application
//! ├── TaskQueue ◄──────── WorkerPool (N threads)
//! ├── FrameSynchronizer
//! ├── SubmissionRegistry ── GpuDevice
//! ├── SharedView
//! ├── RenderLoop (1 thread)
//! └── FrameOrchestrator (runs on the caller's thread via update())
//! ```

use std::sync::Arc;

use magnet_core::{FrameSynchronizer, TaskQueue, TaskQueueStats, WorkerPool};
use magnet_render::{
    FrameReport, GpuDevice, RenderLoop, RenderShared, RenderState, RenderStats, SharedView, SubmissionRegistry,
};

use crate::config::EngineConfig;
use crate::error::AppResult;
use crate::orchestrator::{FrameOrchestrator, FrameStep, OrchestratorParts, OrchestratorStats};
use crate::scene::Scene;

/// Summary returned by [`Application::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Final update counter.
    pub frames_updated: u64,
    /// Final render counter.
    pub frames_rendered: u64,
    /// Task queue lifetime counters.
    pub tasks: TaskQueueStats,
    /// Queued tasks dropped at shutdown.
    pub tasks_dropped: usize,
    /// Orchestrator counters.
    pub orchestrator: OrchestratorStats,
    /// Render thread totals.
    pub render: RenderStats,
}

/// A running frame pipeline.
#[derive(Debug)]
pub struct Application {
    queue: Arc<TaskQueue>,
    sync: Arc<FrameSynchronizer>,
    registry: Arc<SubmissionRegistry>,
    view: Arc<SharedView>,
    pool: WorkerPool,
    render_loop: RenderLoop,
    orchestrator: FrameOrchestrator,
}

impl Application {
    /// Builds the pipeline and starts its threads.
    ///
    /// Worker threads start draining immediately. The render thread starts
    /// in WAITING; the first [`Application::update`] begins rendering. The
    /// first round of update tasks is distributed here for frame 1, the
    /// bootstrap frame, so the first swap already has submissions to hand
    /// over.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or if a thread cannot be spawned.
    pub fn start(config: &EngineConfig, device: Arc<dyn GpuDevice>, scene: Scene) -> AppResult<Self> {
        config.validate()?;

        let queue = Arc::new(TaskQueue::new());
        let sync = Arc::new(FrameSynchronizer::new(config.render_poll()));
        let registry = Arc::new(SubmissionRegistry::new(device, config.submission_limits()));
        let view = Arc::new(SharedView::default());

        let render_loop = RenderLoop::spawn(
            RenderShared {
                registry: Arc::clone(&registry),
                view: Arc::clone(&view),
                sync: Arc::clone(&sync),
            },
            config.render_loop(),
        )?;
        let pool = WorkerPool::start(Arc::clone(&queue), config.worker_pool())?;

        let mut orchestrator = FrameOrchestrator::new(
            OrchestratorParts {
                queue: Arc::clone(&queue),
                sync: Arc::clone(&sync),
                registry: Arc::clone(&registry),
                view: Arc::clone(&view),
                render: render_loop.controller(),
            },
            scene,
            config.render_stall_timeout(),
        );
        let initial = orchestrator.distribute(1);

        tracing::info!(
            workers = pool.worker_count(),
            objects = orchestrator.scene().len(),
            initial_tasks = initial,
            "application started"
        );

        Ok(Self {
            queue,
            sync,
            registry,
            view,
            pool,
            render_loop,
            orchestrator,
        })
    }

    /// Runs one orchestrator iteration. Call from the update thread.
    ///
    /// # Errors
    ///
    /// Returns the orchestrator's stall error.
    pub fn update(&mut self) -> AppResult<FrameStep> {
        Ok(self.orchestrator.step()?)
    }

    /// Calls [`Application::update`] until a frame boundary is crossed.
    ///
    /// # Errors
    ///
    /// As [`Application::update`].
    pub fn run_frame(&mut self) -> AppResult<u64> {
        Ok(self.orchestrator.run_frame()?)
    }

    /// Queues arbitrary work for the worker pool.
    pub fn enqueue_task<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.enqueue_fn(work);
    }

    /// Allows the render thread to start rendering.
    pub fn begin_rendering(&self) -> bool {
        self.render_loop.begin_rendering()
    }

    /// Tells the render thread to stop.
    pub fn stop_rendering(&self) {
        self.render_loop.stop_rendering();
    }

    /// Returns the update counter.
    #[must_use]
    pub fn update_frame_count(&self) -> u64 {
        self.sync.update_count()
    }

    /// Returns the render counter.
    #[must_use]
    pub fn render_frame_count(&self) -> u64 {
        self.sync.render_count()
    }

    /// Returns the render thread's state.
    #[must_use]
    pub fn render_state(&self) -> RenderState {
        self.render_loop.state()
    }

    /// Returns the frame counters.
    #[must_use]
    pub fn synchronizer(&self) -> &Arc<FrameSynchronizer> {
        &self.sync
    }

    /// Returns the submission registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubmissionRegistry> {
        &self.registry
    }

    /// Returns the shared view data.
    #[must_use]
    pub fn view(&self) -> &Arc<SharedView> {
        &self.view
    }

    /// Returns the task queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    /// Returns orchestrator counters.
    #[must_use]
    pub fn orchestrator_stats(&self) -> OrchestratorStats {
        self.orchestrator.stats()
    }

    /// Takes every frame report published so far.
    #[must_use]
    pub fn drain_reports(&self) -> Vec<FrameReport> {
        self.render_loop.reports().try_iter().collect()
    }

    /// Stops rendering, joins the render thread, then stops and joins the
    /// workers. Queued tasks are dropped and counted.
    ///
    /// # Errors
    ///
    /// Returns the first thread failure; every thread is still joined.
    pub fn shutdown(self) -> AppResult<ShutdownReport> {
        let Self {
            queue,
            sync,
            pool,
            render_loop,
            orchestrator,
            ..
        } = self;

        let render = render_loop.join();
        let workers = pool.shutdown();
        let render = render?;
        let workers = workers?;

        let counters = sync.snapshot();
        let report = ShutdownReport {
            frames_updated: counters.update,
            frames_rendered: counters.render,
            tasks: queue.stats(),
            tasks_dropped: workers.tasks_dropped,
            orchestrator: orchestrator.stats(),
            render,
        };

        tracing::info!(
            updated = report.frames_updated,
            rendered = report.frames_rendered,
            completed = report.tasks.completed,
            panicked = report.tasks.panicked,
            dropped = report.tasks_dropped,
            "application shut down"
        );
        Ok(report)
    }
}
