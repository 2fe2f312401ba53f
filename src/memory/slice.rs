// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Shared-ownership windows into memory blocks.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::memory::MemoryBlock;

/// A shared-ownership window `[start, end)` into a [`MemoryBlock`].
///
/// Subslicing produces a new window sharing the same block; the block is
/// released only when all slices referencing it are dropped.
#[derive(Clone)]
pub struct MemorySlice {
    block: Arc<MemoryBlock>,
    start: usize,
    end: usize,
}

impl MemorySlice {
    /// A slice covering the whole block.
    pub fn new(block: Arc<MemoryBlock>) -> Self {
        let end = block.len();

        MemorySlice {
            block,
            start: 0,
            end,
        }
    }

    /// An empty slice.
    pub fn empty() -> Self {
        static EMPTY_BLOCK: OnceLock<Arc<MemoryBlock>> = OnceLock::new();

        let block = EMPTY_BLOCK.get_or_init(|| Arc::new(MemoryBlock::from_vec(Vec::new())));

        MemorySlice {
            block: Arc::clone(block),
            start: 0,
            end: 0,
        }
    }

    /// A heap-backed slice holding a copy of `bytes`.
    pub fn copy_of(bytes: &[u8]) -> Self {
        MemorySlice::new(Arc::new(MemoryBlock::from_vec(bytes.to_vec())))
    }

    pub(crate) fn with_range(block: Arc<MemoryBlock>, start: usize, end: usize) -> Self {
        debug_assert!(start <= end && end <= block.len());

        MemorySlice { block, start, end }
    }

    pub(crate) fn into_raw_parts(self) -> (Arc<MemoryBlock>, usize, usize) {
        (self.block, self.start, self.end)
    }

    pub(crate) fn block(&self) -> &Arc<MemoryBlock> {
        &self.block
    }

    /// The number of bytes in the window.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The bytes of the window.
    pub fn as_bytes(&self) -> &[u8] {
        &self.block.as_bytes()[self.start..self.end]
    }

    /// The first `len` bytes as a new window over the same block.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the window size.
    pub fn first(&self, len: usize) -> MemorySlice {
        assert!(len <= self.len());

        MemorySlice {
            block: Arc::clone(&self.block),
            start: self.start,
            end: self.start + len,
        }
    }

    /// The window starting at `offset` as a new window over the same block.
    ///
    /// # Panics
    ///
    /// Panics if `offset` exceeds the window size.
    pub fn subslice(&self, offset: usize) -> MemorySlice {
        assert!(offset <= self.len());

        MemorySlice {
            block: Arc::clone(&self.block),
            start: self.start + offset,
            end: self.end,
        }
    }

    /// The window `[offset, offset + len)` as a new window over the same
    /// block.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the window size.
    pub fn subslice_range(&self, offset: usize, len: usize) -> MemorySlice {
        assert!(offset + len <= self.len());

        MemorySlice {
            block: Arc::clone(&self.block),
            start: self.start + offset,
            end: self.start + offset + len,
        }
    }
}

impl Default for MemorySlice {
    fn default() -> Self {
        MemorySlice::empty()
    }
}

impl fmt::Debug for MemorySlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySlice")
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}

impl PartialEq for MemorySlice {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for MemorySlice {}

impl AsRef<[u8]> for MemorySlice {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subslice_shares_block() {
        let slice = MemorySlice::copy_of(b"hello world");
        let sub = slice.subslice(6);

        assert_eq!(sub.as_bytes(), b"world");
        assert!(Arc::ptr_eq(slice.block(), sub.block()));
    }

    #[test]
    fn test_subslice_is_idempotent_in_content() {
        let slice = MemorySlice::copy_of(b"abcdef");

        assert_eq!(slice.subslice_range(0, slice.len()), slice);
        assert_eq!(slice.first(slice.len()), slice);
    }

    #[test]
    fn test_block_outlives_parent_slice() {
        let slice = MemorySlice::copy_of(b"payload");
        let sub = slice.subslice_range(3, 4);

        drop(slice);

        assert_eq!(sub.as_bytes(), b"load");
    }

    #[test]
    fn test_empty_slice() {
        let slice = MemorySlice::empty();

        assert!(slice.is_empty());
        assert_eq!(slice.len(), 0);
        assert_eq!(slice.as_bytes(), b"");
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_subslice_panics() {
        let slice = MemorySlice::copy_of(b"abc");
        let _ = slice.subslice(4);
    }
}
