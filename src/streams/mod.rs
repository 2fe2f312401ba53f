// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Byte-stream abstractions over the supported transports.
//!
//! The reader pipeline consumes bytes exclusively through the
//! [`InputStream`] trait. File and in-memory streams are provided here;
//! object-storage streams go through an external [`S3Client`]
//! collaborator, and compression codecs likewise stay external (a store
//! with non-`None` compression surfaces a not-supported error).

mod file;
mod memory;
mod s3;

pub use file::FileInputStream;
pub use memory::InMemoryInputStream;
pub use s3::{S3Client, S3InputStream};

use crate::error::{StreamError, StreamResult};
use crate::memory::{memory_allocator, MemorySlice};

/// A readable, optionally seekable byte stream.
///
/// A stream may return fewer bytes than requested without signalling
/// end-of-stream; only a zero-byte read means the stream is exhausted.
pub trait InputStream: Send {
    /// Read up to `dest.len()` bytes into `dest`, returning the number of
    /// bytes read. Zero means end-of-stream.
    fn read(&mut self, dest: &mut [u8]) -> StreamResult<usize>;

    /// Read up to `size` bytes into a [`MemorySlice`].
    ///
    /// Zero-copy streams return a window into their backing block; other
    /// streams fill a freshly allocated block. The returned slice may be
    /// shorter than `size` at end-of-stream.
    fn read_slice(&mut self, size: usize) -> StreamResult<MemorySlice> {
        let mut block = memory_allocator()
            .allocate(size)
            .map_err(StreamError::from)?;

        let mut filled = 0;
        {
            let buf = block.as_mut_bytes();
            while filled < buf.len() {
                let num_bytes_read = self.read(&mut buf[filled..])?;
                if num_bytes_read == 0 {
                    break;
                }

                filled += num_bytes_read;
            }
        }

        Ok(MemorySlice::new(std::sync::Arc::new(block)).first(filled))
    }

    /// Move the read position to `position` bytes from the start.
    fn seek(&mut self, position: u64) -> StreamResult<()> {
        let _ = position;

        Err(StreamError::NotSeekable)
    }

    /// The total size of the stream in bytes.
    fn size(&self) -> u64;

    /// The current read position.
    fn position(&self) -> u64;

    /// Release the underlying resources. Subsequent reads fail.
    fn close(&mut self);

    /// Whether the stream has been closed.
    fn closed(&self) -> bool;

    /// Whether the stream supports `seek`.
    fn seekable(&self) -> bool {
        false
    }

    /// Whether `read_slice` returns windows into a shared block instead of
    /// copying.
    fn supports_zero_copy(&self) -> bool {
        false
    }
}
