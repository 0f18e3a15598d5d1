//! # Frame Synchronizer
//!
//! Two monotonically increasing counters and the handshake between the
//! update side and the render side.
//!
//! ## States
//!
//! ```text
//! update == 0              bootstrap, nothing produced yet
//! update == render         renderer idle; update side may build the next frame
//! update == render + 1     a frame is ready or being drawn; update side waits
//! ```
//!
//! The lag `update - render` is always 0 or 1. Each counter is its own
//! atomic; they are never locked together. A separate condition variable
//! only wakes waiters early; every wait is still bounded by the poll
//! interval, so a missed wake-up costs at most one interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{CoreError, CoreResult};

/// A consistent snapshot of both counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameCounters {
    /// Frames produced by the update side.
    pub update: u64,
    /// Frames presented by the render side.
    pub render: u64,
}

impl FrameCounters {
    /// Returns `update - render`.
    #[inline]
    #[must_use]
    pub const fn lag(&self) -> u64 {
        self.update - self.render
    }
}

/// Update/render frame counters with the one-frame-lag handshake.
pub struct FrameSynchronizer {
    update_count: AtomicU64,
    render_count: AtomicU64,
    /// Guards nothing but the wake-up handshake.
    signal: Mutex<()>,
    changed: Condvar,
    poll_interval: Duration,
}

impl FrameSynchronizer {
    /// Creates a synchronizer at frame 0 with the given poll interval.
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            update_count: AtomicU64::new(0),
            render_count: AtomicU64::new(0),
            signal: Mutex::new(()),
            changed: Condvar::new(),
            poll_interval,
        }
    }

    /// Returns the maximum time a single wait step parks.
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Reads the update counter.
    #[inline]
    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.update_count.load(Ordering::Acquire)
    }

    /// Reads the render counter.
    #[inline]
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.render_count.load(Ordering::Acquire)
    }

    /// Reads both counters consistently.
    ///
    /// The update counter is read on both sides of the render read; the
    /// pair is only returned once it did not move in between.
    #[must_use]
    pub fn snapshot(&self) -> FrameCounters {
        loop {
            let before = self.update_count();
            let render = self.render_count();
            let after = self.update_count();
            if before == after {
                return FrameCounters {
                    update: after,
                    render,
                };
            }
        }
    }

    /// Advances the update counter. Update side only.
    ///
    /// Returns the new update count.
    ///
    /// # Panics
    ///
    /// Panics if the render side has not caught up. Advancing anyway would
    /// let the update side run two frames ahead and hand the renderer a
    /// slot that is still being written.
    pub fn advance_update(&self) -> u64 {
        let update = self.update_count();
        let render = self.render_count();
        assert!(
            update == render,
            "frame counter invariant violated: advance_update with update={update} render={render}"
        );
        let next = self.update_count.fetch_add(1, Ordering::AcqRel) + 1;
        self.notify();
        next
    }

    /// Advances the render counter. Render side only.
    ///
    /// Returns the new render count.
    ///
    /// # Panics
    ///
    /// Panics if there is no produced frame to account for.
    pub fn advance_render(&self) -> u64 {
        let render = self.render_count();
        let update = self.update_count();
        assert!(
            update == render + 1,
            "frame counter invariant violated: advance_render with update={update} render={render}"
        );
        let next = self.render_count.fetch_add(1, Ordering::AcqRel) + 1;
        self.notify();
        next
    }

    /// Blocks until the render counter equals the update counter.
    ///
    /// `timeout` of `None` waits forever. Returns the caught-up frame.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RenderStalled`] if the render side did not catch
    /// up within `timeout`.
    pub fn wait_for_render(&self, timeout: Option<Duration>) -> CoreResult<u64> {
        let start = Instant::now();
        let update = self.update_count();
        loop {
            if self.render_count() == update {
                return Ok(update);
            }

            let step = match timeout {
                Some(limit) => {
                    let waited = start.elapsed();
                    if waited >= limit {
                        return Err(CoreError::RenderStalled {
                            update,
                            render: self.render_count(),
                            waited,
                        });
                    }
                    self.poll_interval.min(limit - waited)
                }
                None => self.poll_interval,
            };

            let mut signal = self.signal.lock();
            if self.render_count() != update {
                let _ = self.changed.wait_for(&mut signal, step);
            }
        }
    }

    /// Waits at most one poll interval for the update counter to move ahead
    /// of `render`.
    ///
    /// Returns true if a frame is ready to render.
    pub fn wait_for_update(&self, render: u64) -> bool {
        if self.update_count() > render {
            return true;
        }
        let mut signal = self.signal.lock();
        if self.update_count() > render {
            return true;
        }
        let _ = self.changed.wait_for(&mut signal, self.poll_interval);
        drop(signal);
        self.update_count() > render
    }

    fn notify(&self) {
        let _signal = self.signal.lock();
        self.changed.notify_all();
    }
}

impl Default for FrameSynchronizer {
    fn default() -> Self {
        Self::new(Duration::from_millis(5))
    }
}

impl std::fmt::Debug for FrameSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counters = self.snapshot();
        f.debug_struct("FrameSynchronizer")
            .field("update", &counters.update)
            .field("render", &counters.render)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
