// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Contiguous memory blocks with shared ownership.
//!
//! A [`MemoryBlock`] is the unit of ownership behind every
//! [`MemorySlice`](crate::memory::MemorySlice). Three variants exist:
//! heap blocks (mutable, resizable in place), file-mapped blocks
//! (read-only, backed by a mapped file region), and file-backed blocks
//! (mutable, backed by an unlinked temporary file). A heap block created
//! with an oversize threshold migrates to a file-backed block when a
//! resize pushes it past that threshold.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::{Mmap, MmapMut, MmapOptions};

static NEXT_TEMP_ID: AtomicU64 = AtomicU64::new(0);

/// A contiguous byte region with an owning handle.
///
/// Blocks are shared through `Arc`; the region is released when the last
/// handle is dropped. Mutation requires exclusive ownership of the `Arc`.
#[derive(Debug)]
pub enum MemoryBlock {
    /// Mutable heap region, resizable in place.
    Heap(HeapMemory),
    /// Read-only region backed by a mapped file.
    FileMapped(FileMappedMemory),
    /// Mutable region backed by an unlinked temporary file.
    FileBacked(FileBackedMemory),
}

impl MemoryBlock {
    /// Allocate a zero-filled heap block that never migrates off the heap.
    pub fn heap(size: usize) -> Self {
        MemoryBlock::Heap(HeapMemory::new(size, usize::MAX))
    }

    /// Allocate a heap block that migrates to file-backed memory once a
    /// resize pushes it past `oversize_threshold` bytes.
    pub fn hybrid(size: usize, oversize_threshold: usize) -> Self {
        MemoryBlock::Heap(HeapMemory::new(size, oversize_threshold))
    }

    /// Wrap existing bytes in a heap block.
    pub fn from_vec(buf: Vec<u8>) -> Self {
        MemoryBlock::Heap(HeapMemory {
            buf,
            oversize_threshold: usize::MAX,
        })
    }

    /// Map `file` read-only into memory.
    pub fn map_file(file: &File) -> io::Result<Self> {
        let map = unsafe { Mmap::map(file)? };
        Ok(MemoryBlock::FileMapped(FileMappedMemory { map }))
    }

    /// The number of bytes in the block.
    pub fn len(&self) -> usize {
        match self {
            MemoryBlock::Heap(b) => b.buf.len(),
            MemoryBlock::FileMapped(b) => b.map.len(),
            MemoryBlock::FileBacked(b) => b.len,
        }
    }

    /// Whether the block is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the block can be resized.
    pub fn resizable(&self) -> bool {
        !matches!(self, MemoryBlock::FileMapped(_))
    }

    /// The bytes of the block.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MemoryBlock::Heap(b) => &b.buf,
            MemoryBlock::FileMapped(b) => &b.map,
            MemoryBlock::FileBacked(b) => &b.map[..b.len],
        }
    }

    /// A mutable view of the bytes. Read-only blocks yield an empty slice.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        match self {
            MemoryBlock::Heap(b) => &mut b.buf,
            MemoryBlock::FileMapped(_) => &mut [],
            MemoryBlock::FileBacked(b) => {
                let len = b.len;
                &mut b.map[..len]
            }
        }
    }

    /// Resize the block to `new_len` bytes, zero-filling any growth.
    ///
    /// A heap block whose new size exceeds its oversize threshold is
    /// migrated to a file-backed block; the data stays file-backed from
    /// then on, as re-accessing an initialized mapping has no extra
    /// latency. Resizing a file-mapped block fails.
    pub fn resize(&mut self, new_len: usize) -> io::Result<()> {
        match self {
            MemoryBlock::Heap(b) if new_len > b.oversize_threshold => {
                tracing::debug!(
                    old_len = b.buf.len(),
                    new_len,
                    "moving data from heap to file-backed memory"
                );

                let mut backed = FileBackedMemory::with_len(new_len)?;
                backed.map[..b.buf.len()].copy_from_slice(&b.buf);

                *self = MemoryBlock::FileBacked(backed);

                Ok(())
            }
            MemoryBlock::Heap(b) => {
                b.buf.resize(new_len, 0);
                Ok(())
            }
            MemoryBlock::FileMapped(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "a file-mapped memory block cannot be resized",
            )),
            MemoryBlock::FileBacked(b) => b.resize(new_len),
        }
    }
}

/// A mutable heap region with an optional migration threshold.
#[derive(Debug)]
pub struct HeapMemory {
    buf: Vec<u8>,
    oversize_threshold: usize,
}

impl HeapMemory {
    fn new(size: usize, oversize_threshold: usize) -> Self {
        HeapMemory {
            buf: vec![0; size],
            oversize_threshold,
        }
    }
}

/// A read-only region backed by a mapped file.
#[derive(Debug)]
pub struct FileMappedMemory {
    map: Mmap,
}

/// A mutable region backed by an unlinked temporary file.
///
/// The temporary file is removed from the filesystem immediately after
/// creation so the space is reclaimed automatically once the block (and
/// therefore the file descriptor) is dropped.
#[derive(Debug)]
pub struct FileBackedMemory {
    file: File,
    map: MmapMut,
    len: usize,
}

impl FileBackedMemory {
    /// Create a zero-filled file-backed region of `len` bytes.
    pub fn with_len(len: usize) -> io::Result<Self> {
        let path = temp_file_path();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        // Unlink right away; the mapping keeps the storage alive.
        std::fs::remove_file(&path)?;

        // A zero-length mapping is invalid; keep at least one page's worth.
        file.set_len(len.max(1) as u64)?;

        let map = unsafe { MmapOptions::new().map_mut(&file)? };

        Ok(FileBackedMemory { file, map, len })
    }

    fn resize(&mut self, new_len: usize) -> io::Result<()> {
        self.file.set_len(new_len.max(1) as u64)?;

        // Growing the file invalidates the old view; map the new extent.
        self.map = unsafe { MmapOptions::new().map_mut(&self.file)? };
        self.len = new_len;

        Ok(())
    }
}

fn temp_file_path() -> PathBuf {
    let id = NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed);

    std::env::temp_dir().join(format!("mlfeed-{}-{}.tmp", std::process::id(), id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_block_resize_in_place() {
        let mut block = MemoryBlock::heap(4);
        block.as_mut_bytes().copy_from_slice(b"abcd");

        block.resize(8).unwrap();
        assert_eq!(block.len(), 8);
        assert_eq!(&block.as_bytes()[..4], b"abcd");
        assert_eq!(&block.as_bytes()[4..], &[0, 0, 0, 0]);
        assert!(matches!(block, MemoryBlock::Heap(_)));
    }

    #[test]
    fn test_hybrid_block_migrates_past_threshold() {
        let mut block = MemoryBlock::hybrid(8, 16);
        block.as_mut_bytes()[..3].copy_from_slice(b"xyz");

        // Still under the threshold: stays on the heap.
        block.resize(16).unwrap();
        assert!(matches!(block, MemoryBlock::Heap(_)));

        // Past the threshold: migrates to file-backed memory.
        block.resize(64).unwrap();
        assert!(matches!(block, MemoryBlock::FileBacked(_)));
        assert_eq!(block.len(), 64);
        assert_eq!(&block.as_bytes()[..3], b"xyz");

        // Writable after migration.
        block.as_mut_bytes()[63] = 0xAA;
        assert_eq!(block.as_bytes()[63], 0xAA);
    }

    #[test]
    fn test_file_backed_block_resize() {
        let mut block = MemoryBlock::FileBacked(FileBackedMemory::with_len(4).unwrap());
        block.as_mut_bytes().copy_from_slice(b"1234");

        block.resize(10).unwrap();
        assert_eq!(block.len(), 10);
        assert_eq!(&block.as_bytes()[..4], b"1234");
    }

    #[test]
    fn test_mapped_block_is_not_resizable() {
        let path = std::env::temp_dir().join(format!("mlfeed-map-test-{}", std::process::id()));
        std::fs::write(&path, b"mapped contents").unwrap();

        let file = File::open(&path).unwrap();
        let mut block = MemoryBlock::map_file(&file).unwrap();

        assert!(!block.resizable());
        assert_eq!(block.as_bytes(), b"mapped contents");
        assert!(block.resize(32).is_err());

        drop(block);
        std::fs::remove_file(&path).unwrap();
    }
}
