// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Zero-copy stream over an in-memory slice.

use crate::error::{StreamError, StreamResult};
use crate::memory::MemorySlice;
use crate::streams::InputStream;

/// A seekable, zero-copy stream over a [`MemorySlice`].
///
/// Also used for memory-mapped files: mapping the file into a block and
/// wrapping the resulting slice gives the whole-file zero-copy read path.
#[derive(Debug)]
pub struct InMemoryInputStream {
    slice: MemorySlice,
    position: usize,
    closed: bool,
}

impl InMemoryInputStream {
    /// Create a stream over `slice`.
    pub fn new(slice: MemorySlice) -> Self {
        InMemoryInputStream {
            slice,
            position: 0,
            closed: false,
        }
    }

    fn check_open(&self) -> StreamResult<()> {
        if self.closed {
            return Err(StreamError::Closed);
        }

        Ok(())
    }
}

impl InputStream for InMemoryInputStream {
    fn read(&mut self, dest: &mut [u8]) -> StreamResult<usize> {
        self.check_open()?;

        let remaining = &self.slice.as_bytes()[self.position..];
        let num_bytes_read = remaining.len().min(dest.len());

        dest[..num_bytes_read].copy_from_slice(&remaining[..num_bytes_read]);
        self.position += num_bytes_read;

        Ok(num_bytes_read)
    }

    fn read_slice(&mut self, size: usize) -> StreamResult<MemorySlice> {
        self.check_open()?;

        let len = size.min(self.slice.len() - self.position);
        let window = self.slice.subslice_range(self.position, len);

        self.position += len;

        Ok(window)
    }

    fn seek(&mut self, position: u64) -> StreamResult<()> {
        self.check_open()?;

        if position > self.slice.len() as u64 {
            return Err(StreamError::Io(std::sync::Arc::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek position is past the end of the stream",
            ))));
        }

        self.position = position as usize;

        Ok(())
    }

    fn size(&self) -> u64 {
        self.slice.len() as u64
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn close(&mut self) {
        self.slice = MemorySlice::empty();
        self.closed = true;
    }

    fn closed(&self) -> bool {
        self.closed
    }

    fn seekable(&self) -> bool {
        true
    }

    fn supports_zero_copy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_and_position() {
        let mut stream = InMemoryInputStream::new(MemorySlice::copy_of(b"0123456789"));

        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(stream.position(), 4);

        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).unwrap(), 6);
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_slice_is_zero_copy() {
        let slice = MemorySlice::copy_of(b"abcdef");
        let mut stream = InMemoryInputStream::new(slice.clone());

        let window = stream.read_slice(6).unwrap();
        assert_eq!(window.as_bytes(), b"abcdef");
        assert!(std::sync::Arc::ptr_eq(window.block(), slice.block()));

        assert!(stream.read_slice(1).unwrap().is_empty());
    }

    #[test]
    fn test_seek() {
        let mut stream = InMemoryInputStream::new(MemorySlice::copy_of(b"abcdef"));

        stream.seek(4).unwrap();
        let mut buf = [0u8; 2];
        stream.read(&mut buf).unwrap();
        assert_eq!(&buf, b"ef");

        assert!(stream.seek(7).is_err());
    }

    #[test]
    fn test_closed_stream_fails() {
        let mut stream = InMemoryInputStream::new(MemorySlice::copy_of(b"abc"));
        stream.close();

        assert!(stream.closed());
        assert!(matches!(
            stream.read(&mut [0u8; 1]),
            Err(StreamError::Closed)
        ));
    }
}
