//! # Worker Pool
//!
//! Fixed-size set of background threads draining a shared [`TaskQueue`].
//!
//! Each worker loops: claim a task, run it; when the queue is empty, park
//! on the queue's condition variable for at most `idle_poll` before
//! checking again. Shutdown is cooperative: the stop flag is raised, idle
//! workers are woken, running tasks finish, and every thread is joined.
//! Tasks still queued at that point are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};
use crate::task::queue::TaskQueue;

/// Worker pool configuration.
#[derive(Clone, Debug)]
pub struct WorkerPoolConfig {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Maximum time an idle worker parks before re-checking the queue.
    pub idle_poll: Duration,
    /// Thread name prefix.
    pub name_prefix: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            idle_poll: Duration::from_millis(10),
            name_prefix: "magnet-worker".to_string(),
        }
    }
}

/// Summary returned when the pool shuts down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerPoolReport {
    /// Workers that were joined.
    pub workers_joined: usize,
    /// Queued tasks dropped at shutdown.
    pub tasks_dropped: usize,
}

/// Fixed set of threads executing tasks from a shared queue.
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    /// Starts `config.worker_count` threads pulling from `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WorkerSpawn`] if a thread cannot be created.
    /// Workers started before the failure are stopped and joined.
    pub fn start(queue: Arc<TaskQueue>, config: WorkerPoolConfig) -> CoreResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let mut pool = Self {
            queue,
            stop,
            workers: Vec::with_capacity(config.worker_count),
            config,
        };

        for index in 0..pool.config.worker_count {
            let queue = Arc::clone(&pool.queue);
            let stop = Arc::clone(&pool.stop);
            let idle_poll = pool.config.idle_poll;

            let spawned = std::thread::Builder::new()
                .name(format!("{}-{index}", pool.config.name_prefix))
                .spawn(move || worker_main(index, &queue, &stop, idle_poll));

            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(source) => {
                    let _ = pool.stop_and_join();
                    return Err(CoreError::WorkerSpawn { index, source });
                }
            }
        }

        tracing::info!(workers = pool.workers.len(), "worker pool started");
        Ok(pool)
    }

    /// Returns the number of running worker threads.
    #[inline]
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Returns the queue the workers drain.
    #[must_use]
    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    /// Returns true once shutdown has been requested.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Stops every worker and joins it.
    ///
    /// In-flight tasks complete; queued tasks are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WorkerPanicked`] if a worker thread died
    /// outside task execution. All other workers are still joined.
    pub fn shutdown(mut self) -> CoreResult<WorkerPoolReport> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> CoreResult<WorkerPoolReport> {
        self.stop.store(true, Ordering::Release);
        self.queue.wake_all();

        let mut report = WorkerPoolReport::default();
        let mut first_panic = None;
        for (index, handle) in self.workers.drain(..).enumerate() {
            if handle.join().is_err() {
                first_panic.get_or_insert(index);
            } else {
                report.workers_joined += 1;
            }
        }

        report.tasks_dropped = self.queue.discard_pending();
        if report.tasks_dropped > 0 {
            tracing::warn!(dropped = report.tasks_dropped, "queued tasks dropped at shutdown");
        }
        tracing::info!(joined = report.workers_joined, "worker pool stopped");

        match first_panic {
            Some(index) => Err(CoreError::WorkerPanicked(index)),
            None => Ok(report),
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("stopping", &self.is_stopping())
            .field("config", &self.config)
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            let _ = self.stop_and_join();
        }
    }
}

fn worker_main(index: usize, queue: &TaskQueue, stop: &AtomicBool, idle_poll: Duration) {
    tracing::debug!(worker = index, "worker running");
    while !stop.load(Ordering::Acquire) {
        if let Some(task) = queue.dequeue_timeout(idle_poll) {
            task.execute();
        }
    }
    tracing::debug!(worker = index, "worker terminated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn config(workers: usize) -> WorkerPoolConfig {
        WorkerPoolConfig {
            worker_count: workers,
            idle_poll: Duration::from_millis(2),
            name_prefix: "test-worker".to_string(),
        }
    }

    fn wait_idle(queue: &TaskQueue) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !queue.is_idle() {
            assert!(Instant::now() < deadline, "workers never drained the queue");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_pool_executes_every_task_once() {
        let queue = Arc::new(TaskQueue::new());
        let pool = WorkerPool::start(Arc::clone(&queue), config(4)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..500 {
            let counter = Arc::clone(&counter);
            queue.enqueue_fn(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }

        wait_idle(&queue);
        assert_eq!(counter.load(Ordering::Relaxed), 500);

        let report = pool.shutdown().unwrap();
        assert_eq!(report.workers_joined, 4);
        assert_eq!(report.tasks_dropped, 0);
    }

    #[test]
    fn test_worker_survives_panicking_task() {
        let queue = Arc::new(TaskQueue::new());
        let pool = WorkerPool::start(Arc::clone(&queue), config(1)).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        queue.enqueue_fn(|| panic!("bad update"));
        let after = Arc::clone(&ran);
        queue.enqueue_fn(move || {
            after.fetch_add(1, Ordering::Relaxed);
        });

        wait_idle(&queue);
        assert_eq!(ran.load(Ordering::Relaxed), 1);
        assert_eq!(queue.stats().panicked, 1);
        assert_eq!(pool.shutdown().unwrap().workers_joined, 1);
    }

    #[test]
    fn test_shutdown_drops_queued_tasks() {
        let queue = Arc::new(TaskQueue::new());
        let pool = WorkerPool::start(Arc::clone(&queue), config(0)).unwrap();

        for _ in 0..7 {
            queue.enqueue_fn(|| {});
        }

        let report = pool.shutdown().unwrap();
        assert_eq!(report.tasks_dropped, 7);
        assert_eq!(queue.stats().discarded, 7);
    }

    #[test]
    fn test_shutdown_waits_for_running_task() {
        let queue = Arc::new(TaskQueue::new());
        let pool = WorkerPool::start(Arc::clone(&queue), config(1)).unwrap();
        let finished = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&finished);
        queue.enqueue_fn(move || {
            std::thread::sleep(Duration::from_millis(30));
            flag.store(true, Ordering::Release);
        });

        while queue.in_flight() == 0 && queue.has_pending() {
            std::thread::sleep(Duration::from_millis(1));
        }
        pool.shutdown().unwrap();
        assert!(finished.load(Ordering::Acquire));
    }
}
