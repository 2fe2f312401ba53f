// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Length-prefixed binary record framing (RecordIO).
//!
//! Each record starts with an 8-byte header: a little-endian `u32` magic
//! number followed by a little-endian `u32` word packing a 3-bit record
//! kind in the high bits and a 29-bit payload size in the low bits.
//! Payloads are padded to a 4-byte boundary. There is no formal
//! specification of the byte order; it is assumed to always be
//! little-endian.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{RecordError, RecordResult};
use crate::memory::MemorySlice;
use crate::records::{Record, RecordDecoder, RecordKind};

/// The little-endian magic number (`\n\x23\xd7\xce` as a `u32`).
pub const MAGIC: u32 = 0xced7_230a;

/// The size of the record header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Records are aligned to this boundary.
pub const ALIGNMENT: usize = 4;

const PAYLOAD_SIZE_MASK: u32 = (1 << 29) - 1;

/// A decoded RecordIO header word.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordIoHeader {
    word: u32,
}

impl RecordIoHeader {
    pub(crate) fn kind(&self) -> RecordResult<RecordKind> {
        RecordKind::from_wire((self.word >> 29) & 0b111)
    }

    pub(crate) fn payload_size(&self) -> usize {
        (self.word & PAYLOAD_SIZE_MASK) as usize
    }
}

/// Decode the header at the front of `bytes`.
///
/// Returns `None` when fewer than [`HEADER_SIZE`] bytes are available; a
/// wrong magic number fails immediately.
pub(crate) fn decode_header(bytes: &[u8]) -> RecordResult<Option<RecordIoHeader>> {
    if bytes.len() < HEADER_SIZE {
        return Ok(None);
    }

    if LittleEndian::read_u32(&bytes[..4]) != MAGIC {
        return Err(RecordError::corrupt_header(
            "the header does not start with the RecordIO magic number",
        ));
    }

    Ok(Some(RecordIoHeader {
        word: LittleEndian::read_u32(&bytes[4..8]),
    }))
}

/// Round `size` up to the record alignment.
pub(crate) fn align(size: usize) -> usize {
    (size + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Encode a record frame; the inverse of the decoder, used to build
/// fixtures and by the framing round-trip tests.
pub fn encode_record(kind: RecordKind, payload: &[u8]) -> Vec<u8> {
    let kind = match kind {
        RecordKind::Complete => 0u32,
        RecordKind::Begin => 1,
        RecordKind::Middle => 2,
        RecordKind::End => 3,
    };

    let word = (kind << 29) | (payload.len() as u32 & PAYLOAD_SIZE_MASK);

    let mut frame = Vec::with_capacity(HEADER_SIZE + align(payload.len()));
    frame.extend_from_slice(&MAGIC.to_le_bytes());
    frame.extend_from_slice(&word.to_le_bytes());
    frame.extend_from_slice(payload);
    frame.resize(HEADER_SIZE + align(payload.len()), 0);

    frame
}

/// Decoder framing RecordIO records.
#[derive(Debug, Default)]
pub struct RecordIoDecoder {
    size_hint: Option<usize>,
}

impl RecordIoDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        RecordIoDecoder::default()
    }
}

impl RecordDecoder for RecordIoDecoder {
    fn decode_record(
        &mut self,
        chunk: &mut MemorySlice,
        ignore_leftover: bool,
    ) -> RecordResult<Option<Record>> {
        if chunk.is_empty() {
            return Ok(None);
        }

        let header = match decode_header(chunk.as_bytes())? {
            Some(header) => header,
            None => {
                if ignore_leftover {
                    return Ok(None);
                }

                return Err(RecordError::corrupt_header(
                    "the record does not have a valid RecordIO header",
                ));
            }
        };

        let payload_size = header.payload_size();
        let aligned_payload_size = align(payload_size);
        let record_size = HEADER_SIZE + aligned_payload_size;

        if record_size > chunk.len() {
            if ignore_leftover {
                // The record is larger than the current chunk; ask for a
                // chunk that fits it.
                self.size_hint = Some(record_size);

                return Ok(None);
            }

            return Err(RecordError::corrupt_header(format!(
                "the record payload has a size of {} byte(s), while the size specified in the \
                 RecordIO header is {} byte(s)",
                chunk.len() - HEADER_SIZE,
                aligned_payload_size
            )));
        }

        let kind = header.kind()?;
        let payload = chunk.subslice_range(HEADER_SIZE, payload_size);

        *chunk = chunk.subslice(record_size);

        Ok(Some(Record::with_kind(payload, kind)))
    }

    fn take_size_hint(&mut self) -> Option<usize> {
        self.size_hint.take()
    }
}
