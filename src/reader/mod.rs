// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The public reader surface.
//!
//! A [`DataReader`] turns a dataset into an ordered stream of
//! [`Example`]s. Format-specific readers ([`TextLineReader`],
//! [`CsvReader`], [`RecordIoProtobufReader`], [`ImageReader`]) plug a
//! [`DataFormat`] into the shared [`ParallelDataReader`] pipeline, which
//! owns the instance reader chain, the batcher, and the background decode
//! graph.

mod csv;
mod image;
mod options;
mod parallel;
mod recordio_protobuf;
mod text;

pub use csv::{CsvReader, CsvReaderOptions};
pub use image::{ImageDecoder, ImageFrame, ImageReader, ImageReaderOptions, RawImageDecoder};
pub use options::{BadExampleHandling, LastExampleHandling, ReaderOptions};
pub use parallel::{DataFormat, ParallelDataReader};
pub use recordio_protobuf::{encode_record as encode_protobuf_record, proto, RecordIoProtobufReader};
pub use text::TextLineReader;

use std::sync::Arc;

use tracing::warn;

use crate::error::{DataReaderError, Result};
use crate::example::Example;
use crate::instances::Instance;
use crate::schema::Schema;

/// Reads examples from a dataset in a particular data format.
///
/// Readers are single-consumer: `read_example`, `peek_example`, and
/// `reset` must be called from one thread at a time. `num_bytes_read` is
/// safe from any thread through the reader's shared counter.
pub trait DataReader: Send {
    /// The schema of the dataset. Inferred lazily on first use and
    /// cached; it never changes across resets.
    fn read_schema(&mut self) -> Result<Arc<Schema>>;

    /// The next example, or `None` once the epoch is exhausted.
    fn read_example(&mut self) -> Result<Option<Example>>;

    /// The next example without consuming it.
    fn peek_example(&mut self) -> Result<Option<Example>>;

    /// Rewind to the beginning of the dataset, cancelling any in-flight
    /// background work and clearing latched errors.
    fn reset(&mut self);

    /// The number of dataset bytes successfully decoded so far.
    ///
    /// Does not include discarded framing such as record headers, and
    /// may run ahead of consumption because decoding is prefetched.
    fn num_bytes_read(&self) -> u64;
}

/// Apply the bad-example policy to one bad instance inside a batch.
///
/// Under `pad*` handling the instance's slot is zero-filled and counted
/// as padding (`Ok`); under every other policy the whole batch fails
/// (`Err`) and the sequencer applies the example-level policy.
pub(crate) fn handle_bad_instance(
    handling: BadExampleHandling,
    warn_bad_instances: bool,
    instance: &Instance,
    message: &str,
) -> Result<()> {
    if warn_bad_instances {
        warn!(
            instance_index = instance.index(),
            message, "discarding a bad instance"
        );
    }

    match handling {
        BadExampleHandling::Pad | BadExampleHandling::PadWarn => {
            if handling == BadExampleHandling::PadWarn {
                warn!(
                    instance_index = instance.index(),
                    "padding the slot of a bad instance"
                );
            }

            Ok(())
        }
        BadExampleHandling::Error | BadExampleHandling::Skip | BadExampleHandling::SkipWarn => {
            Err(DataReaderError::invalid_instance(instance.index(), message))
        }
    }
}
