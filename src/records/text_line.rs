// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Text-line record framing.

use crate::error::{RecordError, RecordResult};
use crate::memory::MemorySlice;
use crate::records::{Record, RecordDecoder};

/// The UTF-8 byte-order mark.
pub(crate) const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Frame one line off the front of `chunk`.
///
/// LF and CRLF terminate a line; a lone CR terminates it as well unless
/// it is the last byte of the chunk lookahead. The terminator is consumed
/// but excluded from the payload. At end-of-stream the remaining bytes
/// form the final line.
pub(crate) fn read_line(
    chunk: &mut MemorySlice,
    ignore_leftover: bool,
    max_line_length: Option<usize>,
) -> RecordResult<Option<Record>> {
    let bytes = chunk.as_bytes();
    if bytes.is_empty() {
        if ignore_leftover {
            return Ok(None);
        }

        return Err(RecordError::corrupt_record(
            "the text line ends with a corrupt character",
        ));
    }

    let mut has_carriage = false;
    let mut pos = 0;

    while pos < bytes.len() {
        let chr = bytes[pos];
        if chr == b'\n' {
            break;
        }

        if chr == b'\r' {
            // Eat the carriage when the line ends with CRLF.
            if pos + 1 < bytes.len() && bytes[pos + 1] == b'\n' {
                has_carriage = true;
                pos += 1;
            }

            break;
        }

        pos += 1;
    }

    if let Some(max_line_length) = max_line_length {
        if pos >= max_line_length {
            return Err(RecordError::too_large(format!(
                "the text line exceeds the maximum length of {max_line_length}"
            )));
        }
    }

    if pos == bytes.len() && ignore_leftover {
        return Ok(None);
    }

    let payload = if has_carriage {
        chunk.first(pos - 1)
    } else {
        chunk.first(pos)
    };

    // Skip the terminator unless the stream simply ended.
    *chunk = if pos != bytes.len() {
        chunk.subslice(pos + 1)
    } else {
        MemorySlice::empty()
    };

    Ok(Some(Record::new(payload)))
}

/// Strip a UTF-8 BOM off the very beginning of the stream.
pub(crate) fn strip_bom(chunk: &mut MemorySlice) {
    if chunk.as_bytes().starts_with(UTF8_BOM) {
        *chunk = chunk.subslice(UTF8_BOM.len());
    }
}

/// Decoder framing one text line per record.
#[derive(Debug, Default)]
pub struct TextLineDecoder {
    max_line_length: Option<usize>,
    skip_blank_lines: bool,
    seen_start: bool,
}

impl TextLineDecoder {
    /// Create a decoder.
    pub fn new(max_line_length: Option<usize>, skip_blank_lines: bool) -> Self {
        TextLineDecoder {
            max_line_length,
            skip_blank_lines,
            seen_start: false,
        }
    }
}

impl RecordDecoder for TextLineDecoder {
    fn decode_record(
        &mut self,
        chunk: &mut MemorySlice,
        ignore_leftover: bool,
    ) -> RecordResult<Option<Record>> {
        if !self.seen_start && !chunk.is_empty() {
            strip_bom(chunk);
            self.seen_start = true;
        }

        loop {
            if chunk.is_empty() {
                return Ok(None);
            }

            let record = read_line(chunk, ignore_leftover, self.max_line_length)?;
            match record {
                Some(record) if self.skip_blank_lines && record.payload().is_empty() => continue,
                other => return Ok(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_of(bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut decoder = TextLineDecoder::default();
        let mut chunk = MemorySlice::copy_of(bytes);
        let mut lines = Vec::new();

        while let Some(record) = decoder.decode_record(&mut chunk, false).unwrap() {
            lines.push(record.payload().as_bytes().to_vec());
        }

        lines
    }

    #[test]
    fn test_lf_terminated_lines() {
        assert_eq!(lines_of(b"a\nbb\nccc\n"), vec![b"a".to_vec(), b"bb".to_vec(), b"ccc".to_vec()]);
    }

    #[test]
    fn test_crlf_terminated_lines() {
        assert_eq!(lines_of(b"a\r\nbb\r\n"), vec![b"a".to_vec(), b"bb".to_vec()]);
    }

    #[test]
    fn test_cr_only_terminates() {
        assert_eq!(lines_of(b"a\rbb"), vec![b"a".to_vec(), b"bb".to_vec()]);
    }

    #[test]
    fn test_missing_final_terminator() {
        assert_eq!(lines_of(b"a\nbb"), vec![b"a".to_vec(), b"bb".to_vec()]);
    }

    #[test]
    fn test_blank_lines_kept_by_default() {
        assert_eq!(
            lines_of(b"a\n\nb\n"),
            vec![b"a".to_vec(), b"".to_vec(), b"b".to_vec()]
        );
    }

    #[test]
    fn test_blank_lines_skipped_when_asked() {
        let mut decoder = TextLineDecoder::new(None, true);
        let mut chunk = MemorySlice::copy_of(b"a\n\n\nb\n");
        let mut lines = Vec::new();

        while let Some(record) = decoder.decode_record(&mut chunk, false).unwrap() {
            lines.push(record.payload().as_bytes().to_vec());
        }

        assert_eq!(lines, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn test_bom_is_stripped_once() {
        assert_eq!(
            lines_of(b"\xEF\xBB\xBFfirst\nsecond\n"),
            vec![b"first".to_vec(), b"second".to_vec()]
        );
    }

    #[test]
    fn test_incomplete_line_waits_for_more_bytes() {
        let mut decoder = TextLineDecoder::default();
        let mut chunk = MemorySlice::copy_of(b"partial");

        assert!(decoder.decode_record(&mut chunk, true).unwrap().is_none());
        assert_eq!(chunk.as_bytes(), b"partial");
    }

    #[test]
    fn test_line_too_long() {
        let mut decoder = TextLineDecoder::new(Some(4), false);
        let mut chunk = MemorySlice::copy_of(b"abcdefgh\n");

        assert!(matches!(
            decoder.decode_record(&mut chunk, false),
            Err(RecordError::TooLarge { .. })
        ));
    }
}
