// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CSV record framing.
//!
//! Frames one CSV line per record. Unlike the plain text decoder, the
//! framing is quote-aware: with `allow_quoted_new_lines` set, a quoted
//! field may contain the delimiter and literal newlines, so line breaks
//! inside quotes do not terminate the record.

use crate::error::{RecordError, RecordResult};
use crate::memory::MemorySlice;
use crate::records::text_line::{read_line, strip_bom};
use crate::records::{Record, RecordDecoder};

/// Framing parameters for CSV records.
#[derive(Debug, Clone)]
pub struct CsvFraming {
    /// The field delimiter.
    pub delimiter: u8,
    /// The quote character.
    pub quote_char: u8,
    /// Lines starting with this character are skipped entirely.
    pub comment_char: Option<u8>,
    /// Whether quoted fields may contain literal newlines.
    pub allow_quoted_new_lines: bool,
    /// Whether blank lines are skipped instead of framed.
    pub skip_blank_lines: bool,
    /// Bound on the line length; exceeding it is a record-too-large
    /// failure.
    pub max_line_length: Option<usize>,
}

impl Default for CsvFraming {
    fn default() -> Self {
        CsvFraming {
            delimiter: b',',
            quote_char: b'"',
            comment_char: None,
            allow_quoted_new_lines: false,
            skip_blank_lines: true,
            max_line_length: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    NewField,
    InField,
    InQuotedField,
    QuoteInQuotedField,
    HasCarriage,
}

/// Decoder framing one CSV line per record.
#[derive(Debug)]
pub struct CsvRecordDecoder {
    framing: CsvFraming,
    seen_start: bool,
}

impl CsvRecordDecoder {
    /// Create a decoder with the given framing parameters.
    pub fn new(framing: CsvFraming) -> Self {
        CsvRecordDecoder {
            framing,
            seen_start: false,
        }
    }

    fn is_comment_line(&self, chunk: &MemorySlice) -> bool {
        match self.framing.comment_char {
            Some(comment_char) => chunk.as_bytes().first() == Some(&comment_char),
            None => false,
        }
    }

    /// Quote-aware line framing, a finite automaton over
    /// {new_field, in_field, in_quoted_field, quote_in_quoted_field,
    /// has_carriage}.
    fn read_quoted_line(
        &self,
        chunk: &mut MemorySlice,
        ignore_leftover: bool,
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

        let delimiter = self.framing.delimiter;
        let quote_char = self.framing.quote_char;

        let mut state = ParserState::NewField;
        let mut pos = 0;
        let mut end_state: Option<ParserState> = None;

        while pos < bytes.len() {
            let chr = bytes[pos];
            pos += 1;

            match state {
                ParserState::NewField => {
                    if chr == delimiter {
                        // An empty field; stay put.
                    } else if chr == quote_char {
                        state = ParserState::InQuotedField;
                    } else if chr == b'\n' {
                        end_state = Some(state);
                    } else if chr == b'\r' {
                        state = ParserState::HasCarriage;
                    } else {
                        state = ParserState::InField;
                    }
                }
                ParserState::InField => {
                    if chr == delimiter {
                        state = ParserState::NewField;
                    } else if chr == b'\n' {
                        end_state = Some(state);
                    } else if chr == b'\r' {
                        state = ParserState::HasCarriage;
                    }
                }
                ParserState::InQuotedField => {
                    if chr == quote_char {
                        state = ParserState::QuoteInQuotedField;
                    }
                }
                ParserState::QuoteInQuotedField => {
                    if chr == delimiter {
                        state = ParserState::NewField;
                    } else if chr == quote_char {
                        // A doubled quote is a literal quote.
                        state = ParserState::InQuotedField;
                    } else if chr == b'\n' {
                        end_state = Some(state);
                    } else if chr == b'\r' {
                        state = ParserState::HasCarriage;
                    } else {
                        state = ParserState::InField;
                    }
                }
                ParserState::HasCarriage => {
                    if chr == b'\n' {
                        end_state = Some(ParserState::HasCarriage);
                    } else {
                        // Only a carriage: the line ended one byte back;
                        // do not lose the character just read.
                        pos -= 1;
                        end_state = Some(ParserState::NewField);
                    }
                }
            }

            if end_state.is_some() {
                break;
            }
        }

        if let Some(max_line_length) = self.framing.max_line_length {
            if pos >= max_line_length {
                return Err(RecordError::too_large(format!(
                    "the text line exceeds the maximum length of {max_line_length}"
                )));
            }
        }

        if let Some(end_state) = end_state {
            // The terminator is consumed but excluded from the payload.
            let payload = if end_state == ParserState::HasCarriage {
                chunk.first(pos - 2)
            } else {
                chunk.first(pos - 1)
            };

            *chunk = chunk.subslice(pos);

            return Ok(Some(Record::new(payload)));
        }

        // Ran out of bytes before a terminator.
        if ignore_leftover {
            return Ok(None);
        }

        let payload = match state {
            ParserState::InQuotedField => {
                return Err(RecordError::corrupt_record(
                    "EOF reached inside a quoted field",
                ));
            }
            ParserState::HasCarriage => chunk.first(chunk.len() - 1),
            _ => chunk.clone(),
        };

        *chunk = MemorySlice::empty();

        Ok(Some(Record::new(payload)))
    }
}

impl RecordDecoder for CsvRecordDecoder {
    fn decode_record(
        &mut self,
        chunk: &mut MemorySlice,
        ignore_leftover: bool,
    ) -> RecordResult<Option<Record>> {
        if !self.seen_start && !chunk.is_empty() {
            strip_bom(chunk);
            self.seen_start = true;
        }

        while !chunk.is_empty() {
            if self.is_comment_line(chunk) {
                if read_line(chunk, ignore_leftover, None)?.is_none() {
                    break;
                }

                continue;
            }

            let record = if self.framing.allow_quoted_new_lines {
                self.read_quoted_line(chunk, ignore_leftover)?
            } else {
                read_line(chunk, ignore_leftover, self.framing.max_line_length)?
            };

            let Some(record) = record else {
                return Ok(None);
            };

            if !self.framing.skip_blank_lines || !record.payload().is_empty() {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder(framing: CsvFraming) -> CsvRecordDecoder {
        CsvRecordDecoder::new(framing)
    }

    fn quoted_framing() -> CsvFraming {
        CsvFraming {
            allow_quoted_new_lines: true,
            ..CsvFraming::default()
        }
    }

    fn records_of(decoder: &mut CsvRecordDecoder, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut chunk = MemorySlice::copy_of(bytes);
        let mut records = Vec::new();

        while let Some(record) = decoder.decode_record(&mut chunk, false).unwrap() {
            records.push(record.payload().as_bytes().to_vec());
        }

        records
    }

    #[test]
    fn test_plain_lines() {
        let mut decoder = decoder(quoted_framing());

        assert_eq!(
            records_of(&mut decoder, b"a,b,c\nd,e,f\n"),
            vec![b"a,b,c".to_vec(), b"d,e,f".to_vec()]
        );
    }

    #[test]
    fn test_quoted_newline_does_not_split_record() {
        let mut decoder = decoder(quoted_framing());

        assert_eq!(
            records_of(&mut decoder, b"a,\"x\ny\",c\nnext,1,2\n"),
            vec![b"a,\"x\ny\",c".to_vec(), b"next,1,2".to_vec()]
        );
    }

    #[test]
    fn test_doubled_quote_stays_in_field() {
        let mut decoder = decoder(quoted_framing());

        assert_eq!(
            records_of(&mut decoder, b"\"he said \"\"hi\"\"\",x\n"),
            vec![b"\"he said \"\"hi\"\"\",x".to_vec()]
        );
    }

    #[test]
    fn test_crlf_lines() {
        let mut decoder = decoder(quoted_framing());

        assert_eq!(
            records_of(&mut decoder, b"a,b\r\nc,d\r\n"),
            vec![b"a,b".to_vec(), b"c,d".to_vec()]
        );
    }

    #[test]
    fn test_comment_lines_are_skipped() {
        let framing = CsvFraming {
            comment_char: Some(b'#'),
            allow_quoted_new_lines: true,
            ..CsvFraming::default()
        };
        let mut decoder = decoder(framing);

        assert_eq!(
            records_of(&mut decoder, b"# header comment\na,b\n# trailing\n"),
            vec![b"a,b".to_vec()]
        );
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut decoder = decoder(quoted_framing());

        assert_eq!(
            records_of(&mut decoder, b"a\n\n\nb\n"),
            vec![b"a".to_vec(), b"b".to_vec()]
        );
    }

    #[test]
    fn test_unterminated_quote_at_eof_is_corrupt() {
        let mut decoder = decoder(quoted_framing());
        let mut chunk = MemorySlice::copy_of(b"a,\"unterminated");

        assert!(matches!(
            decoder.decode_record(&mut chunk, false),
            Err(RecordError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_unterminated_quote_waits_when_leftover_ignored() {
        let mut decoder = decoder(quoted_framing());
        let mut chunk = MemorySlice::copy_of(b"a,\"partial");

        assert!(decoder.decode_record(&mut chunk, true).unwrap().is_none());
    }

    #[test]
    fn test_bom_is_stripped() {
        let mut decoder = decoder(quoted_framing());

        assert_eq!(
            records_of(&mut decoder, b"\xEF\xBB\xBFa,b\n"),
            vec![b"a,b".to_vec()]
        );
    }

    #[test]
    fn test_cr_inside_field_ends_line_when_not_followed_by_lf() {
        let mut decoder = decoder(quoted_framing());

        assert_eq!(
            records_of(&mut decoder, b"ab\rcd\n"),
            vec![b"ab".to_vec(), b"cd".to_vec()]
        );
    }

    #[test]
    fn test_line_too_long() {
        let framing = CsvFraming {
            allow_quoted_new_lines: true,
            max_line_length: Some(4),
            ..CsvFraming::default()
        };
        let mut decoder = decoder(framing);
        let mut chunk = MemorySlice::copy_of(b"abcdefgh\n");

        assert!(matches!(
            decoder.decode_record(&mut chunk, false),
            Err(RecordError::TooLarge { .. })
        ));
    }
}
