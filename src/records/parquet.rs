// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Parquet file framing.
//!
//! Frames whole Parquet files out of a concatenated stream. Only the
//! framing is handled here; decoding the columnar data is out of scope.
//! See <https://github.com/apache/parquet-format> for the file layout.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{RecordError, RecordResult};
use crate::memory::MemorySlice;
use crate::records::{Record, RecordDecoder};

/// The `PAR1` magic number as a little-endian `u32`.
pub const MAGIC: u32 = 0x3152_4150;

const MAGIC_SIZE: usize = 4;
const METADATA_LENGTH_SIZE: usize = 4;

// The absolute minimum metadata is 9 bytes: the four required fields
// (version, schema, num_rows, row_groups), each with a 1-byte header and
// a 1-byte value, plus the stop field.
const MIN_METADATA_SIZE: usize = 9;

/// Decoder framing whole Parquet files as records.
#[derive(Debug, Default)]
pub struct ParquetDecoder;

impl ParquetDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        ParquetDecoder
    }
}

fn is_magic_number(bytes: &[u8], pos: usize) -> bool {
    LittleEndian::read_u32(&bytes[pos..pos + MAGIC_SIZE]) == MAGIC
}

fn is_file_metadata_begin(byte: u8) -> bool {
    // Instead of decoding the metadata we check whether its first byte is
    // one of the Thrift Compact field headers a file metadata can start
    // with.
    matches!(byte, 0x15 | 0x29 | 0x36 | 0x49 | 0x59 | 0x68 | 0x79)
}

/// Whether the magic number at `pos` is preceded by a plausible
/// Thrift-compact file metadata, making it a real footer rather than a
/// `PAR1` sequence inside the payload.
fn is_footer(bytes: &[u8], pos: usize) -> bool {
    if pos < MAGIC_SIZE + METADATA_LENGTH_SIZE {
        return false;
    }

    let metadata_end = pos - METADATA_LENGTH_SIZE;

    // The 4 bytes right before the footer magic number hold the size of
    // the metadata.
    let metadata_size = LittleEndian::read_u32(&bytes[metadata_end..pos]) as usize;

    if metadata_size < MIN_METADATA_SIZE {
        return false;
    }

    // The metadata must fit between the head magic number and its own
    // length field.
    if MAGIC_SIZE + metadata_size > metadata_end {
        return false;
    }

    // The last byte of a Thrift Compact struct is the stop field and must
    // always be zero.
    if bytes[metadata_end - 1] != 0 {
        return false;
    }

    is_file_metadata_begin(bytes[metadata_end - metadata_size])
}

impl RecordDecoder for ParquetDecoder {
    fn decode_record(
        &mut self,
        chunk: &mut MemorySlice,
        ignore_leftover: bool,
    ) -> RecordResult<Option<Record>> {
        if chunk.is_empty() {
            return Ok(None);
        }

        let bytes = chunk.as_bytes();

        if bytes.len() < MAGIC_SIZE {
            if ignore_leftover {
                return Ok(None);
            }

            return Err(RecordError::corrupt_header(
                "the record does not start with the Parquet magic number",
            ));
        }

        if !is_magic_number(bytes, 0) {
            return Err(RecordError::corrupt_header(
                "the record does not start with the Parquet magic number",
            ));
        }

        // The absolute minimum Parquet file is 12 bytes: two magic
        // numbers plus the metadata length field.
        if bytes.len() < 2 * MAGIC_SIZE + METADATA_LENGTH_SIZE {
            if ignore_leftover {
                return Ok(None);
            }

            return Err(RecordError::corrupt_footer(
                "the record does not have a valid Parquet footer",
            ));
        }

        // The record size is unknown up front, so scan for a trailing
        // magic number that is backed by a plausible file metadata; magic
        // bytes alone would yield false positives inside the payload.
        let mut pos = MAGIC_SIZE + METADATA_LENGTH_SIZE;
        while pos <= bytes.len() - MAGIC_SIZE {
            if is_magic_number(bytes, pos) && is_footer(bytes, pos) {
                let end = pos + MAGIC_SIZE;
                let payload = chunk.first(end);

                *chunk = chunk.subslice(end);

                return Ok(Some(Record::new(payload)));
            }

            pos += 1;
        }

        if ignore_leftover {
            return Ok(None);
        }

        Err(RecordError::corrupt_footer(
            "the record does not have a valid Parquet footer",
        ))
    }
}

#[cfg(test)]
pub(crate) fn fake_parquet_file(payload: &[u8]) -> Vec<u8> {
    // version (0x15) field, filler, stop field.
    let mut metadata = vec![0x15, 0x02];
    metadata.resize(MIN_METADATA_SIZE - 1, 0x01);
    metadata.push(0x00);

    let mut file = Vec::new();
    file.extend_from_slice(&MAGIC.to_le_bytes());
    file.extend_from_slice(payload);
    file.extend_from_slice(&metadata);
    file.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
    file.extend_from_slice(&MAGIC.to_le_bytes());

    file
}
