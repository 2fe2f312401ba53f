// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Sequential file stream.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{StreamError, StreamResult};
use crate::streams::InputStream;

/// A seekable stream over a regular file.
///
/// For the zero-copy path over memory-mapped files, map the file into a
/// [`MemoryBlock`](crate::memory::MemoryBlock) and wrap the slice in an
/// [`InMemoryInputStream`](crate::streams::InMemoryInputStream) instead.
#[derive(Debug)]
pub struct FileInputStream {
    file: Option<fs::File>,
    size: u64,
    position: u64,
}

impl FileInputStream {
    /// Open the file at `path` for sequential reading.
    pub fn open<P: AsRef<Path>>(path: P) -> StreamResult<Self> {
        let file = fs::File::open(path.as_ref())?;
        let size = file.metadata()?.len();

        Ok(FileInputStream {
            file: Some(file),
            size,
            position: 0,
        })
    }

    fn file_mut(&mut self) -> StreamResult<&mut fs::File> {
        self.file.as_mut().ok_or(StreamError::Closed)
    }
}

impl InputStream for FileInputStream {
    fn read(&mut self, dest: &mut [u8]) -> StreamResult<usize> {
        let file = self.file_mut()?;
        let num_bytes_read = file.read(dest)?;

        self.position += num_bytes_read as u64;

        Ok(num_bytes_read)
    }

    fn seek(&mut self, position: u64) -> StreamResult<()> {
        let file = self.file_mut()?;

        file.seek(SeekFrom::Start(position))?;
        self.position = position;

        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn closed(&self) -> bool {
        self.file.is_none()
    }

    fn seekable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("mlfeed-{}-{}", std::process::id(), name));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_read_whole_file() {
        let path = fixture("file-stream-read", b"file stream bytes");
        let mut stream = FileInputStream::open(&path).unwrap();

        assert_eq!(stream.size(), 17);

        let slice = stream.read_slice(17).unwrap();
        assert_eq!(slice.as_bytes(), b"file stream bytes");

        assert_eq!(stream.read(&mut [0u8; 4]).unwrap(), 0);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_seek_and_reread() {
        let path = fixture("file-stream-seek", b"0123456789");
        let mut stream = FileInputStream::open(&path).unwrap();

        let mut buf = [0u8; 10];
        stream.read(&mut buf).unwrap();

        stream.seek(5).unwrap();
        let mut tail = [0u8; 5];
        assert_eq!(stream.read(&mut tail).unwrap(), 5);
        assert_eq!(&tail, b"56789");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_closed_file_stream_fails() {
        let path = fixture("file-stream-close", b"abc");
        let mut stream = FileInputStream::open(&path).unwrap();

        stream.close();
        assert!(stream.closed());
        assert!(matches!(
            stream.read(&mut [0u8; 1]),
            Err(StreamError::Closed)
        ));

        fs::remove_file(&path).unwrap();
    }
}
