// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Record framing: chunking raw byte streams into records.
//!
//! A [`RecordDecoder`] frames records out of a contiguous chunk; the
//! [`StreamRecordReader`] drives a decoder over a [`ChunkReader`],
//! refilling the chunk whenever the decoder needs more bytes. Concrete
//! decoders cover text lines, CSV lines, RecordIO frames, Parquet file
//! framing, and whole-stream blobs.

pub mod blob;
pub mod csv;
pub mod parquet;
pub mod recordio;
pub mod text_line;

mod chunk;

pub use chunk::{make_chunk_reader, ChunkReader, DefaultChunkReader, InMemoryChunkReader};

use crate::error::{RecordError, RecordResult};
use crate::memory::MemorySlice;
use crate::streams::InputStream;

/// Whether a record carries a whole instance or one part of a split
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// The record carries a whole instance.
    Complete,
    /// The record is the first part of a split instance.
    Begin,
    /// The record is an inner part of a split instance.
    Middle,
    /// The record is the last part of a split instance.
    End,
}

impl RecordKind {
    pub(crate) fn from_wire(value: u32) -> RecordResult<RecordKind> {
        match value {
            0 => Ok(RecordKind::Complete),
            1 => Ok(RecordKind::Begin),
            2 => Ok(RecordKind::Middle),
            3 => Ok(RecordKind::End),
            other => Err(RecordError::corrupt_header(format!(
                "the header specifies an unknown record kind ({other})"
            ))),
        }
    }
}

/// A framed byte payload.
#[derive(Debug, Clone)]
pub struct Record {
    payload: MemorySlice,
    kind: RecordKind,
}

impl Record {
    /// A complete record over `payload`.
    pub fn new(payload: MemorySlice) -> Self {
        Record {
            payload,
            kind: RecordKind::Complete,
        }
    }

    /// A record of the given kind over `payload`.
    pub fn with_kind(payload: MemorySlice, kind: RecordKind) -> Self {
        Record { payload, kind }
    }

    /// The payload of the record.
    pub fn payload(&self) -> &MemorySlice {
        &self.payload
    }

    /// The kind of the record.
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Consume the record, returning its payload.
    pub fn into_payload(self) -> MemorySlice {
        self.payload
    }
}

/// Reads framed records off a byte stream.
pub trait RecordReader: Send {
    /// Return the next record, or `None` at end-of-stream.
    fn read_record(&mut self) -> RecordResult<Option<Record>>;

    /// Return the next record without consuming it.
    fn peek_record(&mut self) -> RecordResult<Option<Record>>;
}

/// Frames records out of a contiguous chunk.
///
/// `decode_record` consumes the framed bytes from the front of `chunk`
/// and returns the record. Returning `None` with `ignore_leftover` set
/// asks the caller to refill the chunk; returning `None` with it clear is
/// only valid on an empty chunk.
pub trait RecordDecoder: Send {
    /// Decode one record from the front of `chunk`.
    fn decode_record(
        &mut self,
        chunk: &mut MemorySlice,
        ignore_leftover: bool,
    ) -> RecordResult<Option<Record>>;

    /// The minimum chunk size needed to make progress, reported after a
    /// `None` decode of a record larger than the current chunk.
    fn take_size_hint(&mut self) -> Option<usize> {
        None
    }
}

/// Drives a [`RecordDecoder`] over a chunked stream.
pub struct StreamRecordReader<D> {
    decoder: D,
    chunk_reader: Box<dyn ChunkReader>,
    chunk: MemorySlice,
    peeked: Option<Record>,
}

impl<D: RecordDecoder> StreamRecordReader<D> {
    /// Create a reader decoding `stream` with `decoder`.
    pub fn new(decoder: D, stream: Box<dyn InputStream>) -> RecordResult<Self> {
        let chunk_reader = make_chunk_reader(stream)?;

        Ok(StreamRecordReader {
            decoder,
            chunk_reader,
            chunk: MemorySlice::empty(),
            peeked: None,
        })
    }

    /// The size the next chunk will have; grows as oversized records are
    /// encountered.
    pub fn record_size_hint(&self) -> usize {
        self.chunk_reader.chunk_size_hint()
    }

    fn read_record_core(&mut self) -> RecordResult<Option<Record>> {
        loop {
            let ignore_leftover = !self.chunk_reader.eof();

            if let Some(record) = self.decoder.decode_record(&mut self.chunk, ignore_leftover)? {
                return Ok(Some(record));
            }

            if let Some(hint) = self.decoder.take_size_hint() {
                self.chunk_reader.set_chunk_size_hint(hint);
            }

            let leftover = std::mem::take(&mut self.chunk);
            self.chunk = self.chunk_reader.read_chunk(leftover)?;

            if self.chunk.is_empty() {
                return Ok(None);
            }
        }
    }
}

impl<D: RecordDecoder> RecordReader for StreamRecordReader<D> {
    fn read_record(&mut self) -> RecordResult<Option<Record>> {
        if let Some(record) = self.peeked.take() {
            return Ok(Some(record));
        }

        self.read_record_core()
    }

    fn peek_record(&mut self) -> RecordResult<Option<Record>> {
        if self.peeked.is_none() {
            self.peeked = self.read_record_core()?;
        }

        Ok(self.peeked.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::InMemoryInputStream;

    #[test]
    fn test_record_kind_from_wire() {
        assert_eq!(RecordKind::from_wire(0).unwrap(), RecordKind::Complete);
        assert_eq!(RecordKind::from_wire(3).unwrap(), RecordKind::End);
        assert!(RecordKind::from_wire(4).is_err());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let stream = Box::new(InMemoryInputStream::new(MemorySlice::copy_of(
            b"line 1\nline 2\n",
        )));
        let mut reader =
            StreamRecordReader::new(text_line::TextLineDecoder::default(), stream).unwrap();

        let peeked = reader.peek_record().unwrap().unwrap();
        let read = reader.read_record().unwrap().unwrap();
        assert_eq!(peeked.payload(), read.payload());

        let next = reader.read_record().unwrap().unwrap();
        assert_eq!(next.payload().as_bytes(), b"line 2");

        assert!(reader.read_record().unwrap().is_none());
        assert!(reader.peek_record().unwrap().is_none());
    }
}
