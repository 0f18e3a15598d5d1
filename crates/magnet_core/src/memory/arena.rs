//! # Arena Allocator
//!
//! A bump allocator for per-frame constant data that is released all at once.

use crate::error::{CoreError, CoreResult};

/// Alignment of every block handed out by an [`Arena`].
///
/// Shader constant blocks are laid out in 16-byte registers.
pub const BLOCK_ALIGN: usize = 16;

/// Location of a block inside an [`Arena`].
///
/// Only meaningful for the arena that produced it, until that arena is
/// reset or rewound past it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlobRange {
    offset: usize,
    len: usize,
}

impl BlobRange {
    /// Returns the block length in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true for a zero-length block.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A bump-pointer arena over a pre-allocated byte buffer.
///
/// Allocations copy bytes in and bump the offset. Memory is reclaimed all
/// at once by [`Arena::reset`]; the backing buffer is never freed or
/// reallocated.
///
/// # Thread Safety
///
/// Mutation needs `&mut self`; wrap the arena in the lock of whatever owns
/// it.
///
/// # Example
///
/// ```rust
/// use magnet_core::Arena;
///
/// let mut arena = Arena::new(1024);
/// let block = arena.alloc_copy(&[1, 2, 3, 4]).unwrap();
/// assert_eq!(arena.get(block), Some(&[1u8, 2, 3, 4][..]));
///
/// arena.reset();
/// assert_eq!(arena.used(), 0);
/// ```
pub struct Arena {
    storage: Box<[u8]>,
    offset: usize,
    /// Highest offset ever reached, for sizing diagnostics.
    high_water: usize,
}

impl Arena {
    /// Creates a new arena with the specified capacity in bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            offset: 0,
            high_water: 0,
        }
    }

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns the current used space in bytes.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.offset
    }

    /// Returns the remaining free space in bytes.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.offset
    }

    /// Returns the highest usage seen since creation.
    #[inline]
    #[must_use]
    pub const fn high_water(&self) -> usize {
        self.high_water
    }

    /// Copies `bytes` into the arena.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ArenaExhausted`] if the aligned block does not
    /// fit. The arena is unchanged in that case.
    pub fn alloc_copy(&mut self, bytes: &[u8]) -> CoreResult<BlobRange> {
        let start = align_up(self.offset, BLOCK_ALIGN);
        let end = start
            .checked_add(bytes.len())
            .filter(|end| *end <= self.capacity())
            .ok_or(CoreError::ArenaExhausted {
                requested: bytes.len(),
                remaining: self.remaining(),
                capacity: self.capacity(),
            })?;

        self.storage[start..end].copy_from_slice(bytes);
        self.offset = end;
        self.high_water = self.high_water.max(end);

        Ok(BlobRange {
            offset: start,
            len: bytes.len(),
        })
    }

    /// Returns the bytes of a block, or `None` if it lies past the used area.
    #[inline]
    #[must_use]
    pub fn get(&self, range: BlobRange) -> Option<&[u8]> {
        let end = range.offset.checked_add(range.len)?;
        if end > self.offset {
            return None;
        }
        self.storage.get(range.offset..end)
    }

    /// Returns a marker for [`Arena::rewind`].
    #[inline]
    #[must_use]
    pub const fn mark(&self) -> usize {
        self.offset
    }

    /// Releases every block allocated after `mark`.
    #[inline]
    pub fn rewind(&mut self, mark: usize) {
        self.offset = self.offset.min(mark);
    }

    /// Resets the arena, invalidating all previous blocks.
    ///
    /// No memory is freed or reallocated.
    #[inline]
    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity())
            .field("used", &self.offset)
            .field("high_water", &self.high_water)
            .finish()
    }
}

#[inline]
const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_allocation() {
        let mut arena = Arena::new(1024);
        let block = arena.alloc_copy(&[9; 10]).unwrap();
        assert_eq!(block.len(), 10);
        assert_eq!(arena.get(block).unwrap(), &[9; 10]);
    }

    #[test]
    fn test_blocks_are_aligned() {
        let mut arena = Arena::new(1024);
        let _ = arena.alloc_copy(&[1; 3]).unwrap();
        let second = arena.alloc_copy(&[2; 4]).unwrap();
        assert_eq!(second.offset % BLOCK_ALIGN, 0);
        assert_eq!(arena.used(), BLOCK_ALIGN + 4);
    }

    #[test]
    fn test_arena_reset() {
        let mut arena = Arena::new(1024);
        let block = arena.alloc_copy(&[1; 64]).unwrap();
        assert!(arena.used() > 0);

        arena.reset();
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.high_water(), 64);
        assert!(arena.get(block).is_none());
    }

    #[test]
    fn test_arena_exhausted() {
        let mut arena = Arena::new(32);
        let _ = arena.alloc_copy(&[0; 20]).unwrap();

        let err = arena.alloc_copy(&[0; 20]).unwrap_err();
        assert!(matches!(err, CoreError::ArenaExhausted { requested: 20, .. }));
        assert_eq!(arena.used(), 20);
    }

    #[test]
    fn test_rewind_rolls_back() {
        let mut arena = Arena::new(256);
        let keep = arena.alloc_copy(&[1; 16]).unwrap();
        let mark = arena.mark();
        let _ = arena.alloc_copy(&[2; 16]).unwrap();

        arena.rewind(mark);
        assert_eq!(arena.used(), 16);
        assert_eq!(arena.get(keep).unwrap(), &[1; 16]);
    }
}
