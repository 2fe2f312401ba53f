// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Whole-stream blob framing.

use crate::error::RecordResult;
use crate::memory::MemorySlice;
use crate::records::{Record, RecordDecoder};

/// Decoder returning the entire remaining stream as one complete record.
///
/// Used for records whose boundary is externally known, such as one image
/// per file.
#[derive(Debug, Default)]
pub struct BlobDecoder;

impl BlobDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        BlobDecoder
    }
}

impl RecordDecoder for BlobDecoder {
    fn decode_record(
        &mut self,
        chunk: &mut MemorySlice,
        _ignore_leftover: bool,
    ) -> RecordResult<Option<Record>> {
        if chunk.is_empty() {
            return Ok(None);
        }

        let payload = std::mem::take(chunk);

        Ok(Some(Record::new(payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{RecordKind, RecordReader, StreamRecordReader};
    use crate::streams::InMemoryInputStream;

    #[test]
    fn test_whole_stream_is_one_record() {
        let stream = Box::new(InMemoryInputStream::new(MemorySlice::copy_of(
            b"the whole stream",
        )));
        let mut reader = StreamRecordReader::new(BlobDecoder::new(), stream).unwrap();

        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.kind(), RecordKind::Complete);
        assert_eq!(record.payload().as_bytes(), b"the whole stream");

        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn test_empty_stream_has_no_records() {
        let stream = Box::new(InMemoryInputStream::new(MemorySlice::empty()));
        let mut reader = StreamRecordReader::new(BlobDecoder::new(), stream).unwrap();

        assert!(reader.read_record().unwrap().is_none());
    }
}
