//! # Task Queue
//!
//! Unbounded FIFO of deferred work shared by the worker pool and the
//! update thread.
//!
//! ## In-Flight Tracking
//!
//! ```text
//! enqueue ──> [ queued ] ──try_dequeue──> [ in flight ] ──execute/drop──> gone
//!                  │                            │
//!                  └──── both counted by is_idle() ─┘
//! ```
//!
//! A task moves from "queued" to "in flight" under the queue lock, so an
//! observer that sees an empty queue and zero in-flight tasks knows every
//! task enqueued so far has finished.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

type Work = Box<dyn FnOnce() + Send + 'static>;

/// A deferred unit of work with no arguments and no result.
///
/// Everything the work needs is captured by the closure.
pub struct Task {
    label: Cow<'static, str>,
    work: Work,
}

impl Task {
    /// Creates an unlabeled task.
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::labeled("task", work)
    }

    /// Creates a task with a label used in diagnostics.
    pub fn labeled<L, F>(label: L, work: F) -> Self
    where
        L: Into<Cow<'static, str>>,
        F: FnOnce() + Send + 'static,
    {
        Self {
            label: label.into(),
            work: Box::new(work),
        }
    }

    /// Returns the diagnostic label.
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("label", &self.label).finish_non_exhaustive()
    }
}

/// How a task execution ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The work returned normally.
    Completed,
    /// The work panicked; the panic was contained and the task dropped.
    Panicked,
}

/// Counters describing the queue's lifetime activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskQueueStats {
    /// Tasks ever enqueued.
    pub enqueued: u64,
    /// Tasks that ran to completion.
    pub completed: u64,
    /// Tasks whose work panicked.
    pub panicked: u64,
    /// Tasks discarded without running.
    pub discarded: u64,
}

/// Thread-safe FIFO of [`Task`]s.
///
/// The queue is the only structure in the pipeline guarded by a single
/// global lock. Enqueueing never blocks on capacity; dequeueing never waits.
pub struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
    /// Signalled on enqueue and on shutdown.
    available: Condvar,
    /// Signalled when the last in-flight task finishes on an empty queue.
    drained: Condvar,
    in_flight: AtomicUsize,
    enqueued: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
    discarded: AtomicU64,
}

impl TaskQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            drained: Condvar::new(),
            in_flight: AtomicUsize::new(0),
            enqueued: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Appends a task. Never blocks on capacity.
    pub fn enqueue(&self, task: Task) {
        self.tasks.lock().push_back(task);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.available.notify_one();
    }

    /// Convenience wrapper around [`TaskQueue::enqueue`] for a bare closure.
    pub fn enqueue_fn<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Task::new(work));
    }

    /// Removes the head task without blocking.
    ///
    /// The returned claim counts as in flight until it is executed or
    /// dropped.
    #[must_use]
    pub fn try_dequeue(&self) -> Option<ClaimedTask<'_>> {
        let mut tasks = self.tasks.lock();
        let task = tasks.pop_front()?;
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        drop(tasks);

        Some(ClaimedTask {
            task: Some(task),
            queue: self,
        })
    }

    /// Like [`TaskQueue::try_dequeue`], but parks the caller for up to
    /// `timeout` when the queue is empty.
    #[must_use]
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<ClaimedTask<'_>> {
        let mut tasks = self.tasks.lock();
        if tasks.is_empty() {
            let _ = self.available.wait_for(&mut tasks, timeout);
        }
        let task = tasks.pop_front()?;
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        drop(tasks);

        Some(ClaimedTask {
            task: Some(task),
            queue: self,
        })
    }

    /// Returns true if at least one task is waiting to be dequeued.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.tasks.lock().is_empty()
    }

    /// Returns the number of queued (not yet claimed) tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Returns true if no task is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_pending()
    }

    /// Returns the number of claimed tasks that have not finished yet.
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Returns true if nothing is queued and nothing is executing.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let tasks = self.tasks.lock();
        tasks.is_empty() && self.in_flight.load(Ordering::Acquire) == 0
    }

    /// Blocks until the queue is idle or `timeout` elapses.
    ///
    /// Returns true if the queue is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let mut tasks = self.tasks.lock();
        if tasks.is_empty() && self.in_flight.load(Ordering::Acquire) == 0 {
            return true;
        }
        let _ = self.drained.wait_for(&mut tasks, timeout);
        tasks.is_empty() && self.in_flight.load(Ordering::Acquire) == 0
    }

    /// Drops every queued task without running it.
    ///
    /// Returns how many tasks were discarded. Tasks already claimed are
    /// unaffected.
    pub fn discard_pending(&self) -> usize {
        let dropped: Vec<Task> = self.tasks.lock().drain(..).collect();
        let count = dropped.len();
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Wakes every thread parked in [`TaskQueue::dequeue_timeout`].
    pub fn wake_all(&self) {
        self.available.notify_all();
    }

    /// Returns lifetime counters.
    #[must_use]
    pub fn stats(&self) -> TaskQueueStats {
        TaskQueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    fn finish(&self, outcome: Option<TaskOutcome>) {
        match outcome {
            Some(TaskOutcome::Completed) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Some(TaskOutcome::Panicked) => {
                self.panicked.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
            }
        }
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            let tasks = self.tasks.lock();
            if tasks.is_empty() {
                self.drained.notify_all();
            }
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("queued", &self.len())
            .field("in_flight", &self.in_flight())
            .field("stats", &self.stats())
            .finish()
    }
}

/// A task removed from the queue and owned by exactly one thread.
///
/// Dropping the claim without executing it discards the task.
#[must_use = "a claimed task is discarded unless executed"]
pub struct ClaimedTask<'q> {
    task: Option<Task>,
    queue: &'q TaskQueue,
}

impl ClaimedTask<'_> {
    /// Returns the task label.
    #[must_use]
    pub fn label(&self) -> &str {
        self.task.as_ref().map_or("", Task::label)
    }

    /// Runs the task, containing any panic.
    pub fn execute(mut self) -> TaskOutcome {
        let Some(task) = self.task.take() else {
            return TaskOutcome::Completed;
        };

        let Task { label, work } = task;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(()) => TaskOutcome::Completed,
            Err(payload) => {
                tracing::warn!(
                    task = %label,
                    reason = panic_message(payload.as_ref()),
                    "task panicked; dropped"
                );
                TaskOutcome::Panicked
            }
        };

        self.queue.finish(Some(outcome));
        outcome
    }
}

impl Drop for ClaimedTask<'_> {
    fn drop(&mut self) {
        if self.task.take().is_some() {
            self.queue.finish(None);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_enqueue_dequeue_fifo_single_thread() {
        let queue = TaskQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = Arc::clone(&log);
            queue.enqueue_fn(move || log.lock().push(i));
        }
        assert_eq!(queue.len(), 3);

        while let Some(task) = queue.try_dequeue() {
            assert_eq!(task.execute(), TaskOutcome::Completed);
        }

        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert!(queue.is_idle());
        assert_eq!(queue.stats().completed, 3);
    }

    #[test]
    fn test_try_dequeue_empty_returns_none() {
        let queue = TaskQueue::new();
        assert!(queue.try_dequeue().is_none());
        assert!(!queue.has_pending());
    }

    #[test]
    fn test_claim_counts_as_in_flight() {
        let queue = TaskQueue::new();
        queue.enqueue_fn(|| {});

        let claim = queue.try_dequeue().unwrap();
        assert!(!queue.has_pending());
        assert_eq!(queue.in_flight(), 1);
        assert!(!queue.is_idle());

        claim.execute();
        assert_eq!(queue.in_flight(), 0);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_panicking_task_is_contained() {
        let queue = TaskQueue::new();
        queue.enqueue(Task::labeled("boom", || panic!("exploded")));

        let outcome = queue.try_dequeue().unwrap().execute();
        assert_eq!(outcome, TaskOutcome::Panicked);
        assert_eq!(queue.stats().panicked, 1);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_dropped_claim_is_discarded() {
        let queue = TaskQueue::new();
        queue.enqueue_fn(|| unreachable!("must not run"));

        drop(queue.try_dequeue());
        assert_eq!(queue.stats().discarded, 1);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_discard_pending() {
        let queue = TaskQueue::new();
        for _ in 0..5 {
            queue.enqueue_fn(|| {});
        }
        assert_eq!(queue.discard_pending(), 5);
        assert!(queue.is_empty());
        assert_eq!(queue.stats().discarded, 5);
    }

    #[test]
    fn test_dequeue_timeout_wakes_on_enqueue() {
        let queue = Arc::new(TaskQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                queue.enqueue_fn(|| {});
            })
        };

        let mut claimed = None;
        for _ in 0..100 {
            if let Some(task) = queue.dequeue_timeout(Duration::from_millis(50)) {
                claimed = Some(task.execute());
                break;
            }
        }
        producer.join().unwrap();
        assert_eq!(claimed, Some(TaskOutcome::Completed));
    }

    #[test]
    fn test_wait_idle_wakes_when_last_task_finishes() {
        let queue = Arc::new(TaskQueue::new());
        queue.enqueue_fn(|| std::thread::sleep(Duration::from_millis(20)));
        assert!(!queue.wait_idle(Duration::from_millis(1)));

        let runner = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                if let Some(task) = queue.try_dequeue() {
                    task.execute();
                }
            })
        };

        let mut idle = false;
        for _ in 0..100 {
            if queue.wait_idle(Duration::from_millis(50)) {
                idle = true;
                break;
            }
        }
        runner.join().unwrap();
        assert!(idle);
    }
}
