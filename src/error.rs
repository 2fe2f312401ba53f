// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Error types for the dataset reader.
//!
//! Each layer of the pipeline has its own error enum:
//! - [`StreamError`] for byte-stream failures
//! - [`RecordError`] for record framing failures
//! - [`SchemaError`] for schema construction and conformance failures
//!
//! All of them convert into the public [`DataReaderError`] umbrella that
//! the reader API surfaces.

use std::sync::Arc;

use thiserror::Error;

/// Errors raised by byte streams.
///
/// I/O errors are stored behind an `Arc` so that a latched pipeline error
/// can be surfaced to the consumer on every subsequent read.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// The underlying transport failed.
    #[error("the stream cannot be read: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// A decompression wrapper failed to inflate the stream.
    #[error("the stream cannot be inflated: {0}")]
    Inflate(String),

    /// The stream was used after `close()`.
    #[error("the stream is closed")]
    Closed,

    /// `seek()` was called on a non-seekable stream.
    #[error("the stream does not support seeking")]
    NotSeekable,
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Io(Arc::new(err))
    }
}

/// The part of a record that was found to be corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptKind {
    /// The record as a whole is malformed.
    Record,
    /// The record header is malformed.
    Header,
    /// The record footer is malformed.
    Footer,
    /// A split record deviates from the begin, middle, end sequence.
    SplitRecord,
}

/// Errors raised while framing records out of a byte stream.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    /// The underlying stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The stream contains a corrupt record.
    #[error("{message}")]
    Corrupt {
        /// Which part of the record is corrupt.
        kind: CorruptKind,
        /// Human-readable description.
        message: String,
    },

    /// A record exceeds the configured maximum size.
    #[error("{message}")]
    TooLarge {
        /// Human-readable description.
        message: String,
    },
}

impl RecordError {
    /// Create a generic corrupt-record error.
    pub fn corrupt_record(message: impl Into<String>) -> Self {
        RecordError::Corrupt {
            kind: CorruptKind::Record,
            message: message.into(),
        }
    }

    /// Create a corrupt-header error.
    pub fn corrupt_header(message: impl Into<String>) -> Self {
        RecordError::Corrupt {
            kind: CorruptKind::Header,
            message: message.into(),
        }
    }

    /// Create a corrupt-footer error.
    pub fn corrupt_footer(message: impl Into<String>) -> Self {
        RecordError::Corrupt {
            kind: CorruptKind::Footer,
            message: message.into(),
        }
    }

    /// Create a corrupt-split-record error.
    pub fn corrupt_split_record(message: impl Into<String>) -> Self {
        RecordError::Corrupt {
            kind: CorruptKind::SplitRecord,
            message: message.into(),
        }
    }

    /// Create a record-too-large error.
    pub fn too_large(message: impl Into<String>) -> Self {
        RecordError::TooLarge {
            message: message.into(),
        }
    }

    /// The corrupt kind, if this is a corruption error.
    pub fn corrupt_kind(&self) -> Option<CorruptKind> {
        match self {
            RecordError::Corrupt { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Errors raised while constructing or conforming to a schema.
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// Two attributes share the same name.
    #[error("the schema has more than one attribute named '{name}'")]
    DuplicateName {
        /// The duplicated attribute name.
        name: String,
    },

    /// An attribute violates a schema invariant.
    #[error("the attribute '{name}' is invalid: {message}")]
    InvalidAttribute {
        /// The offending attribute name.
        name: String,
        /// Human-readable description.
        message: String,
    },

    /// A decoded example does not conform to the inferred schema.
    #[error("the example does not conform to the schema: {message}")]
    Nonconforming {
        /// Human-readable description.
        message: String,
    },
}

/// The public error type surfaced by [`DataReader`](crate::DataReader)
/// implementations.
#[derive(Debug, Clone, Error)]
pub enum DataReaderError {
    /// The underlying byte stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// A record could not be framed out of the stream.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// The schema could not be inferred or was violated.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// An instance failed format-specific validation.
    #[error("the instance #{index} is invalid: {message}")]
    InvalidInstance {
        /// Index of the offending instance within the epoch.
        index: u64,
        /// Human-readable description.
        message: String,
    },

    /// The requested configuration is recognized but not implemented.
    #[error("the operation is not supported: {0}")]
    NotSupported(String),

    /// The configuration or API usage is invalid.
    #[error("{0}")]
    InvalidArgument(String),
}

impl DataReaderError {
    /// Create an invalid-instance error.
    pub fn invalid_instance(index: u64, message: impl Into<String>) -> Self {
        DataReaderError::InvalidInstance {
            index,
            message: message.into(),
        }
    }

    /// Create a not-supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        DataReaderError::NotSupported(message.into())
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        DataReaderError::InvalidArgument(message.into())
    }
}

/// Result type for reader operations.
pub type Result<T> = std::result::Result<T, DataReaderError>;

/// Result type for stream operations.
pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// Result type for record framing operations.
pub type RecordResult<T> = std::result::Result<T, RecordError>;
