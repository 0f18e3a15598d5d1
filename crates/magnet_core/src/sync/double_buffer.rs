//! # Double Buffer
//!
//! Two slots of `T` and an index bit that assigns one slot to the writer
//! role and the other to the reader role.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────────────────────┐
//!                    │        DoubleBuffer<T>      │
//!                    │                             │
//!                    │  ┌─────────┐  ┌─────────┐   │
//!                    │  │ Slot 0  │  │ Slot 1  │   │
//!                    │  └────┬────┘  └────┬────┘   │
//!                    │       │            │        │
//!                    │  ┌────┴────────────┴────┐   │
//!                    │  │ Atomic write index   │   │
//!                    │  └──────────────────────┘   │
//!                    └─────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!      ┌──────────────┐ ┌────────────┐ ┌────────────┐
//!      │ WriteHandle  │ │ ReadHandle │ │   swap     │
//!      │ (update side)│ │(render side│ │(orchestr.) │
//!      └──────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! ## Thread Safety
//!
//! - Each slot sits behind its own `RwLock`, so concurrent writers to the
//!   write slot serialize per append and never touch the read slot.
//! - A handle re-validates the index after acquiring its slot lock; if a
//!   swap slipped in between, it retries on the correct slot.
//! - `swap_buffers` takes the current write slot's lock before flipping the
//!   index, so no append straddles a swap.
//!
//! Whether the reader is still busy with its slot when a swap happens is
//! NOT tracked here. The frame handshake guarantees that.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Two slots of `T` with swap-only role assignment.
pub struct DoubleBuffer<T> {
    slots: [RwLock<T>; 2],
    /// Slot currently assigned to the writer. The reader owns `write ^ 1`.
    write_index: AtomicUsize,
    swap_count: AtomicU64,
}

impl<T> DoubleBuffer<T> {
    /// Creates a double buffer from two initial slot values.
    ///
    /// `write` starts as the writer's slot.
    #[must_use]
    pub fn new(write: T, read: T) -> Self {
        Self {
            slots: [RwLock::new(write), RwLock::new(read)],
            write_index: AtomicUsize::new(0),
            swap_count: AtomicU64::new(0),
        }
    }

    /// Returns the slot index currently assigned to the writer.
    #[inline]
    #[must_use]
    pub fn write_index(&self) -> usize {
        self.write_index.load(Ordering::Acquire)
    }

    /// Returns the slot index currently assigned to the reader.
    #[inline]
    #[must_use]
    pub fn read_index(&self) -> usize {
        self.write_index() ^ 1
    }

    /// Returns how many swaps have happened.
    #[inline]
    #[must_use]
    pub fn swap_count(&self) -> u64 {
        self.swap_count.load(Ordering::Relaxed)
    }

    /// Locks the writer's slot.
    ///
    /// Blocks while another writer holds the slot or a swap is in progress.
    pub fn write_handle(&self) -> SlotWriteHandle<'_, T> {
        loop {
            let index = self.write_index();
            let guard = self.slots[index].write();
            if self.write_index() == index {
                return SlotWriteHandle {
                    guard,
                    buffer_index: index,
                };
            }
        }
    }

    /// Locks the reader's slot for shared access.
    pub fn read_handle(&self) -> SlotReadHandle<'_, T> {
        loop {
            let index = self.read_index();
            let guard = self.slots[index].read();
            if self.read_index() == index {
                return SlotReadHandle {
                    guard,
                    buffer_index: index,
                };
            }
        }
    }

    /// Locks the reader's slot for exclusive access.
    ///
    /// Reader role only: used to release what the reader consumed so the
    /// slot is clean when the next swap hands it to the writer.
    pub fn read_handle_mut(&self) -> SlotWriteHandle<'_, T> {
        loop {
            let index = self.read_index();
            let guard = self.slots[index].write();
            if self.read_index() == index {
                return SlotWriteHandle {
                    guard,
                    buffer_index: index,
                };
            }
        }
    }

    /// Flips the writer and reader slots.
    ///
    /// Waits for in-progress writes to the current write slot to finish.
    /// Returns the new write index.
    pub fn swap_buffers(&self) -> usize {
        let current = self.write_index();
        let _write_guard = self.slots[current].write();
        let old = self.write_index.fetch_xor(1, Ordering::AcqRel);
        self.swap_count.fetch_add(1, Ordering::Relaxed);
        old ^ 1
    }

    /// Consumes the buffer, returning `(slot 0, slot 1)`.
    #[must_use]
    pub fn into_inner(self) -> (T, T) {
        let [a, b] = self.slots;
        (a.into_inner(), b.into_inner())
    }
}

impl<T: Default> Default for DoubleBuffer<T> {
    fn default() -> Self {
        Self::new(T::default(), T::default())
    }
}

impl<T> std::fmt::Debug for DoubleBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoubleBuffer")
            .field("write_index", &self.write_index())
            .field("swap_count", &self.swap_count())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to one slot of a [`DoubleBuffer`].
pub struct SlotWriteHandle<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
    buffer_index: usize,
}

impl<T> SlotWriteHandle<'_, T> {
    /// Returns the slot index this handle locks.
    #[inline]
    #[must_use]
    pub fn buffer_index(&self) -> usize {
        self.buffer_index
    }
}

impl<T> Deref for SlotWriteHandle<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for SlotWriteHandle<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// Shared access to the reader's slot of a [`DoubleBuffer`].
pub struct SlotReadHandle<'a, T> {
    guard: RwLockReadGuard<'a, T>,
    buffer_index: usize,
}

impl<T> SlotReadHandle<'_, T> {
    /// Returns the slot index this handle locks.
    #[inline]
    #[must_use]
    pub fn buffer_index(&self) -> usize {
        self.buffer_index
    }
}

impl<T> Deref for SlotReadHandle<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}
