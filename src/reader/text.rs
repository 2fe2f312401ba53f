// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Text-line dataset reader.

use std::sync::Arc;

use crate::data_stores::DataStore;
use crate::error::Result;
use crate::example::Example;
use crate::instances::{Instance, InstanceBatch};
use crate::reader::{
    handle_bad_instance, BadExampleHandling, DataFormat, DataReader, ParallelDataReader,
    ReaderOptions,
};
use crate::records::text_line::TextLineDecoder;
use crate::records::{RecordReader, StreamRecordReader};
use crate::schema::{Attribute, Schema};
use crate::tensor::{DataType, DenseTensor, Tensor, TensorData};

/// Reads datasets of UTF-8 text lines.
///
/// Every example has a single string attribute named `value` holding one
/// line per instance.
pub struct TextLineReader {
    inner: ParallelDataReader,
}

impl TextLineReader {
    /// Create a reader over `options`.
    pub fn new(options: ReaderOptions) -> Result<Self> {
        let format = Arc::new(TextLineFormat {
            batch_size: options.batch_size,
            bad_example_handling: options.bad_example_handling,
            warn_bad_instances: options.warn_bad_instances,
        });

        Ok(TextLineReader {
            inner: ParallelDataReader::new(options, format)?,
        })
    }
}

impl DataReader for TextLineReader {
    fn read_schema(&mut self) -> Result<Arc<Schema>> {
        self.inner.read_schema()
    }

    fn read_example(&mut self) -> Result<Option<Example>> {
        self.inner.read_example()
    }

    fn peek_example(&mut self) -> Result<Option<Example>> {
        self.inner.peek_example()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn num_bytes_read(&self) -> u64 {
        self.inner.num_bytes_read()
    }
}

struct TextLineFormat {
    batch_size: usize,
    bad_example_handling: BadExampleHandling,
    warn_bad_instances: bool,
}

impl DataFormat for TextLineFormat {
    fn make_record_reader(&self, store: &dyn DataStore) -> Result<Box<dyn RecordReader>> {
        let stream = store.open_read()?;

        Ok(Box::new(StreamRecordReader::new(
            TextLineDecoder::new(None, false),
            stream,
        )?))
    }

    fn infer_schema(&self, _instance: Option<&Instance>) -> Result<Schema> {
        Ok(Schema::new(vec![Attribute::new(
            "value",
            DataType::String,
            vec![self.batch_size as u64, 1],
        )])?)
    }

    fn decode(&self, batch: &InstanceBatch, schema: &Arc<Schema>) -> Result<Example> {
        let instances = batch.instances();
        let batch_len = instances.len();
        let live = batch_len - batch.padding() as usize;

        let mut values = Vec::with_capacity(batch_len);

        for instance in &instances[..live] {
            match std::str::from_utf8(instance.bits().as_bytes()) {
                Ok(text) => values.push(text.to_string()),
                Err(_) => {
                    handle_bad_instance(
                        self.bad_example_handling,
                        self.warn_bad_instances,
                        instance,
                        "the text line is not valid UTF-8",
                    )?;
                }
            }
        }

        let padding = (batch_len - values.len()) as u64;
        values.resize_with(batch_len, String::new);

        let tensor = Tensor::Dense(DenseTensor::new(
            vec![batch_len as u64, 1],
            TensorData::String(values),
        )?);

        Ok(Example::with_padding(
            Arc::clone(schema),
            vec![tensor],
            padding,
        )?)
    }
}
