// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Data stores: the addressable units a dataset is composed of.
//!
//! A [`DataStore`] hands out fresh [`InputStream`]s over its bytes and is
//! identified by a stable `id()`; store equality and hashing are defined
//! by that id. Local files, in-memory buffers, and S3 objects are
//! provided, plus listing helpers that expand directories and S3 prefixes
//! into natural-sort-ordered store lists.

mod file_list;
mod s3;

pub use file_list::{list_files, natural_cmp, FileListOptions};
pub use s3::{list_s3_objects, parse_s3_uri, S3Object};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{DataReaderError, Result};
use crate::memory::{MemoryBlock, MemorySlice};
use crate::streams::{FileInputStream, InMemoryInputStream, InputStream};

/// How the bytes of a store are compressed.
///
/// Codecs themselves are external collaborators; a store whose resolved
/// compression is not `None` fails to open with a not-supported error
/// unless the host wires in an inflating stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// The bytes are not compressed.
    #[default]
    None,
    /// Infer the codec from the store id (file extension).
    Infer,
    /// gzip/zlib.
    Gzip,
    /// bzip2.
    Bzip2,
    /// zip archive.
    Zip,
}

impl Compression {
    fn infer_from_id(id: &str) -> Compression {
        match Path::new(id).extension().and_then(|e| e.to_str()) {
            Some("gz") | Some("gzip") => Compression::Gzip,
            Some("bz2") => Compression::Bzip2,
            Some("zip") => Compression::Zip,
            _ => Compression::None,
        }
    }
}

/// A source of bytes the reader can open repeatedly.
pub trait DataStore: Send + Sync + fmt::Debug + fmt::Display {
    /// Open a fresh stream over the store's bytes.
    fn open_read(&self) -> Result<Box<dyn InputStream>>;

    /// A stable unique identifier (path, URI, or synthesized name).
    fn id(&self) -> &str;
}

impl PartialEq for dyn DataStore {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for dyn DataStore {}

impl std::hash::Hash for dyn DataStore {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

/// A dataset store backed by a local file.
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
    id: String,
    memory_map: bool,
    compression: Compression,
}

impl File {
    /// Create a store for the file at `path`.
    ///
    /// Memory mapping is on by default, giving record readers the
    /// zero-copy whole-file path.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let id = path.to_string_lossy().into_owned();

        File {
            path,
            id,
            memory_map: true,
            compression: Compression::None,
        }
    }

    /// Set whether the file is memory-mapped when opened.
    pub fn with_memory_map(mut self, memory_map: bool) -> Self {
        self.memory_map = memory_map;
        self
    }

    /// Set the compression of the file.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// The path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn resolved_compression(&self) -> Compression {
        match self.compression {
            Compression::Infer => Compression::infer_from_id(&self.id),
            other => other,
        }
    }
}

impl DataStore for File {
    fn open_read(&self) -> Result<Box<dyn InputStream>> {
        let compression = self.resolved_compression();
        if compression != Compression::None {
            return Err(DataReaderError::not_supported(format!(
                "the store '{}' is compressed ({compression:?}) and no inflate codec is wired in",
                self.id
            )));
        }

        if self.memory_map {
            let file = std::fs::File::open(&self.path)
                .map_err(crate::error::StreamError::from)?;

            // Zero-length files cannot be mapped; fall through to a plain
            // stream which handles them fine.
            if file.metadata().map_err(crate::error::StreamError::from)?.len() > 0 {
                let block = MemoryBlock::map_file(&file).map_err(crate::error::StreamError::from)?;

                return Ok(Box::new(InMemoryInputStream::new(MemorySlice::new(
                    Arc::new(block),
                ))));
            }
        }

        Ok(Box::new(FileInputStream::open(&self.path)?))
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file:{}", self.id)
    }
}

/// A dataset store over bytes already resident in memory.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    slice: MemorySlice,
    id: String,
}

impl InMemoryStore {
    /// Create a store over `slice`.
    pub fn new(slice: MemorySlice) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);

        let id = format!("mem://{}", NEXT_ID.fetch_add(1, Ordering::Relaxed));

        InMemoryStore { slice, id }
    }

    /// Create a store holding a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        InMemoryStore::new(MemorySlice::copy_of(bytes))
    }
}

impl DataStore for InMemoryStore {
    fn open_read(&self) -> Result<Box<dyn InputStream>> {
        Ok(Box::new(InMemoryInputStream::new(self.slice.clone())))
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} byte(s))", self.id, self.slice.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip() {
        let path = std::env::temp_dir().join(format!("mlfeed-store-{}", std::process::id()));
        std::fs::write(&path, b"store bytes").unwrap();

        let store = File::new(&path);
        let mut stream = store.open_read().unwrap();

        assert!(stream.supports_zero_copy());
        let slice = stream.read_slice(stream.size() as usize).unwrap();
        assert_eq!(slice.as_bytes(), b"store bytes");

        // A second open yields an independent stream.
        let mut stream = store.with_memory_map(false).open_read().unwrap();
        assert!(!stream.supports_zero_copy());
        let slice = stream.read_slice(11).unwrap();
        assert_eq!(slice.as_bytes(), b"store bytes");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_compressed_store_is_not_supported() {
        let store = File::new("data.csv.gz").with_compression(Compression::Infer);

        assert!(matches!(
            store.open_read(),
            Err(DataReaderError::NotSupported(_))
        ));
    }

    #[test]
    fn test_in_memory_store_ids_are_unique() {
        let a = InMemoryStore::from_bytes(b"a");
        let b = InMemoryStore::from_bytes(b"b");

        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_store_equality_is_by_id() {
        let a = File::new("/tmp/same");
        let b = File::new("/tmp/same").with_memory_map(false);

        let a: &dyn DataStore = &a;
        let b: &dyn DataStore = &b;

        assert_eq!(a, b);
    }
}
