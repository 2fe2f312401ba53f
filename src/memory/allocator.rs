// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Memory allocators and the process-wide allocator selection.

use std::io;
use std::sync::{Arc, LazyLock, RwLock};

use crate::memory::MemoryBlock;

const MAX_DEFAULT_OVERSIZE_THRESHOLD: usize = 0x2000_0000; // 512 MiB

/// Allocates [`MemoryBlock`]s for chunk buffers and assembled payloads.
pub trait MemoryAllocator: Send + Sync {
    /// Allocate a zero-filled block of `size` bytes.
    fn allocate(&self, size: usize) -> io::Result<MemoryBlock>;
}

/// Allocates plain heap blocks.
#[derive(Debug, Default)]
pub struct HeapAllocator;

impl MemoryAllocator for HeapAllocator {
    fn allocate(&self, size: usize) -> io::Result<MemoryBlock> {
        Ok(MemoryBlock::heap(size))
    }
}

/// Allocates blocks that spill to an unlinked temporary file once they grow
/// past an oversize threshold.
///
/// Small allocations start on the heap and migrate on resize; allocations
/// already past the threshold go straight to file-backed memory.
#[derive(Debug)]
pub struct FileBackedAllocator {
    oversize_threshold: usize,
}

impl FileBackedAllocator {
    /// Create an allocator with the given threshold. A threshold of zero
    /// selects the default of `min(total_ram / 4, 512 MiB)`.
    pub fn new(oversize_threshold: usize) -> Self {
        let oversize_threshold = if oversize_threshold == 0 {
            default_oversize_threshold()
        } else {
            oversize_threshold
        };

        FileBackedAllocator { oversize_threshold }
    }
}

impl Default for FileBackedAllocator {
    fn default() -> Self {
        FileBackedAllocator::new(0)
    }
}

impl MemoryAllocator for FileBackedAllocator {
    fn allocate(&self, size: usize) -> io::Result<MemoryBlock> {
        if size > self.oversize_threshold {
            let backed = crate::memory::block::FileBackedMemory::with_len(size)?;

            return Ok(MemoryBlock::FileBacked(backed));
        }

        Ok(MemoryBlock::hybrid(size, self.oversize_threshold))
    }
}

fn default_oversize_threshold() -> usize {
    let total_ram = total_ram();
    if total_ram == 0 {
        return MAX_DEFAULT_OVERSIZE_THRESHOLD;
    }

    (total_ram / 4).min(MAX_DEFAULT_OVERSIZE_THRESHOLD)
}

#[cfg(target_os = "linux")]
fn total_ram() -> usize {
    let mut info = unsafe { std::mem::zeroed::<libc::sysinfo>() };

    if unsafe { libc::sysinfo(&mut info) } != 0 {
        return 0;
    }

    (info.totalram as usize).saturating_mul(info.mem_unit as usize)
}

#[cfg(not(target_os = "linux"))]
fn total_ram() -> usize {
    0
}

static MEMORY_ALLOCATOR: LazyLock<RwLock<Arc<dyn MemoryAllocator>>> =
    LazyLock::new(|| RwLock::new(Arc::new(FileBackedAllocator::default())));

/// The process-wide memory allocator.
pub fn memory_allocator() -> Arc<dyn MemoryAllocator> {
    Arc::clone(&MEMORY_ALLOCATOR.read().unwrap_or_else(|e| e.into_inner()))
}

/// Replace the process-wide memory allocator.
///
/// Must be called before any reader is constructed; readers capture the
/// allocator lazily as they allocate their first chunk.
pub fn set_memory_allocator(allocator: Arc<dyn MemoryAllocator>) {
    *MEMORY_ALLOCATOR.write().unwrap_or_else(|e| e.into_inner()) = allocator;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_allocator() {
        let block = HeapAllocator.allocate(16).unwrap();

        assert_eq!(block.len(), 16);
        assert!(block.resizable());
    }

    #[test]
    fn test_file_backed_allocator_small_allocation_is_heap() {
        let allocator = FileBackedAllocator::new(1024);
        let block = allocator.allocate(16).unwrap();

        assert!(matches!(block, MemoryBlock::Heap(_)));
    }

    #[test]
    fn test_file_backed_allocator_large_allocation_is_file_backed() {
        let allocator = FileBackedAllocator::new(1024);
        let block = allocator.allocate(4096).unwrap();

        assert!(matches!(block, MemoryBlock::FileBacked(_)));
        assert_eq!(block.len(), 4096);
    }

    #[test]
    fn test_default_threshold_is_bounded() {
        let threshold = default_oversize_threshold();

        assert!(threshold > 0);
        assert!(threshold <= MAX_DEFAULT_OVERSIZE_THRESHOLD);
    }

    #[test]
    fn test_global_allocator_is_available() {
        let allocator = memory_allocator();
        let block = allocator.allocate(8).unwrap();

        assert_eq!(block.len(), 8);
    }
}
