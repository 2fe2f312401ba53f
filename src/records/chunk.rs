// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Chunked buffer management between streams and record decoders.
//!
//! A chunk reader amortizes stream reads into large resizable buffers and
//! carries the unconsumed suffix of one chunk (the leftover) over to the
//! next, so record decoders always see a single contiguous window that
//! contains at least one full record when possible.

use std::sync::Arc;

use crate::error::{RecordResult, StreamError};
use crate::memory::{memory_allocator, MemoryBlock, MemorySlice};
use crate::streams::InputStream;

/// The starting chunk buffer size.
pub(crate) const DEFAULT_CHUNK_SIZE: usize = 0x200_0000; // 32 MiB

/// Reads a stream chunk by chunk, preserving leftovers across calls.
pub trait ChunkReader: Send {
    /// Return a new chunk starting with `leftover` followed by freshly
    /// read bytes. An empty slice means end-of-stream after the leftover
    /// has been consumed.
    fn read_chunk(&mut self, leftover: MemorySlice) -> RecordResult<MemorySlice>;

    /// Whether the underlying stream is exhausted.
    fn eof(&self) -> bool;

    /// The size the next chunk will have.
    fn chunk_size_hint(&self) -> usize;

    /// Guarantee that the next chunk holds at least `value` bytes.
    fn set_chunk_size_hint(&mut self, value: usize);
}

/// Create the chunk reader best suited for `stream`.
///
/// A zero-copy stream whose full size is known is read once into a single
/// slice; everything else goes through the buffering reader.
pub fn make_chunk_reader(mut stream: Box<dyn InputStream>) -> RecordResult<Box<dyn ChunkReader>> {
    if stream.supports_zero_copy() {
        let size = stream.size();
        let chunk = stream.read_slice(size as usize)?;

        // Although this shouldn't happen, make sure we read all the data.
        if chunk.len() as u64 == size {
            return Ok(Box::new(InMemoryChunkReader::new(chunk)));
        }

        stream.seek(0)?;
    }

    Ok(Box::new(DefaultChunkReader::new(stream)))
}

/// Buffering chunk reader over an arbitrary stream.
pub struct DefaultChunkReader {
    stream: Box<dyn InputStream>,
    next_chunk_size: usize,
    chunk: Option<Arc<MemoryBlock>>,
    eof: bool,
}

impl DefaultChunkReader {
    /// Create a reader with the default starting chunk size.
    pub fn new(stream: Box<dyn InputStream>) -> Self {
        DefaultChunkReader::with_chunk_size(stream, DEFAULT_CHUNK_SIZE)
    }

    pub(crate) fn with_chunk_size(stream: Box<dyn InputStream>, chunk_size: usize) -> Self {
        DefaultChunkReader {
            stream,
            next_chunk_size: chunk_size.max(1),
            chunk: None,
            eof: false,
        }
    }
}

impl ChunkReader for DefaultChunkReader {
    fn read_chunk(&mut self, leftover: MemorySlice) -> RecordResult<MemorySlice> {
        if self.eof {
            return Ok(MemorySlice::empty());
        }

        let (lo_block, lo_start, lo_end) = leftover.into_raw_parts();
        let lo_len = lo_end - lo_start;

        // A chunk that was entirely leftover held no complete record;
        // double the next size so at least one record fits.
        if let Some(current) = &self.chunk {
            if current.len() == lo_len && self.next_chunk_size == current.len() {
                self.next_chunk_size <<= 1;
            }
        }

        let mut block = match self.chunk.take() {
            Some(current) if Arc::ptr_eq(&current, &lo_block) => {
                // Both the reader's handle and the leftover's refer to the
                // same block; release the leftover's so only record slices
                // still held downstream keep the count above one.
                drop(lo_block);

                match Arc::try_unwrap(current) {
                    Ok(mut owned) => {
                        // Exclusive: reuse the buffer in place.
                        if lo_len > 0 && lo_start != 0 {
                            owned.as_mut_bytes().copy_within(lo_start..lo_end, 0);
                        }

                        if owned.len() != self.next_chunk_size {
                            owned
                                .resize(self.next_chunk_size)
                                .map_err(StreamError::from)?;
                        }

                        owned
                    }
                    Err(shared) => {
                        // Records still reference the old chunk; start a
                        // fresh buffer and copy the leftover over.
                        let mut fresh = allocate(self.next_chunk_size)?;
                        fresh.as_mut_bytes()[..lo_len]
                            .copy_from_slice(&shared.as_bytes()[lo_start..lo_end]);

                        fresh
                    }
                }
            }
            _ => {
                let mut fresh = allocate(self.next_chunk_size)?;
                if lo_len > 0 {
                    fresh.as_mut_bytes()[..lo_len]
                        .copy_from_slice(&lo_block.as_bytes()[lo_start..lo_end]);
                }

                fresh
            }
        };

        // Fill the buffer after the leftover until it is full or the
        // stream runs dry.
        let mut filled = lo_len;
        {
            let buf = block.as_mut_bytes();
            while filled < buf.len() {
                let num_bytes_read = self.stream.read(&mut buf[filled..])?;
                if num_bytes_read == 0 {
                    self.eof = true;

                    break;
                }

                filled += num_bytes_read;
            }
        }

        let block = Arc::new(block);

        // Keep a handle for the next reuse check unless the stream is
        // exhausted.
        self.chunk = if self.eof {
            None
        } else {
            Some(Arc::clone(&block))
        };

        Ok(MemorySlice::with_range(block, 0, filled))
    }

    fn eof(&self) -> bool {
        self.eof
    }

    fn chunk_size_hint(&self) -> usize {
        self.next_chunk_size
    }

    fn set_chunk_size_hint(&mut self, value: usize) {
        while value > self.next_chunk_size {
            self.next_chunk_size <<= 1;
        }
    }
}

fn allocate(size: usize) -> RecordResult<MemoryBlock> {
    Ok(memory_allocator().allocate(size).map_err(StreamError::from)?)
}

/// Chunk reader over a stream that was read into memory in one piece.
pub struct InMemoryChunkReader {
    chunk: Option<MemorySlice>,
}

impl InMemoryChunkReader {
    /// Create a reader that hands out `chunk` once.
    pub fn new(chunk: MemorySlice) -> Self {
        InMemoryChunkReader { chunk: Some(chunk) }
    }
}

impl ChunkReader for InMemoryChunkReader {
    fn read_chunk(&mut self, _leftover: MemorySlice) -> RecordResult<MemorySlice> {
        Ok(self.chunk.take().unwrap_or_else(MemorySlice::empty))
    }

    fn eof(&self) -> bool {
        // The whole stream is in memory, so decoders must never treat the
        // tail of the single chunk as an incomplete leftover.
        true
    }

    fn chunk_size_hint(&self) -> usize {
        self.chunk.as_ref().map_or(0, MemorySlice::len)
    }

    fn set_chunk_size_hint(&mut self, _value: usize) {}
}
