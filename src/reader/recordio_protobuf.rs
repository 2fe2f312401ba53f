// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Reader for length-prefixed protobuf tensor records in RecordIO frames.
//!
//! Each instance is one protobuf [`proto::Record`]: a map of named
//! feature and label values, where a value is a dense or keyed-sparse
//! tensor of f32/f64/i32 elements, or raw bytes. The schema is inferred
//! from the first record; features and labels share one attribute
//! namespace ordered by name.

use std::collections::HashMap;
use std::sync::Arc;

use prost::Message;

use crate::data_stores::DataStore;
use crate::error::{DataReaderError, Result};
use crate::example::Example;
use crate::instances::{Instance, InstanceBatch};
use crate::reader::{
    handle_bad_instance, BadExampleHandling, DataFormat, DataReader, ParallelDataReader,
    ReaderOptions,
};
use crate::records::recordio::RecordIoDecoder;
use crate::records::{RecordReader, StreamRecordReader};
use crate::schema::{Attribute, Schema};
use crate::tensor::{ByteBuffer, CooTensor, DataType, DenseTensor, Tensor, TensorData};

/// The wire messages of the record format.
pub mod proto {
    /// A dense or keyed-sparse tensor of 32-bit floats.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Float32Tensor {
        /// The elements, row-major.
        #[prost(float, repeated, tag = "1")]
        pub values: ::prost::alloc::vec::Vec<f32>,
        /// Flat indices of the elements; empty for dense tensors.
        #[prost(uint64, repeated, tag = "2")]
        pub keys: ::prost::alloc::vec::Vec<u64>,
        /// The per-instance shape; empty means one-dimensional.
        #[prost(uint64, repeated, tag = "3")]
        pub shape: ::prost::alloc::vec::Vec<u64>,
    }

    /// A dense or keyed-sparse tensor of 64-bit floats.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Float64Tensor {
        /// The elements, row-major.
        #[prost(double, repeated, tag = "1")]
        pub values: ::prost::alloc::vec::Vec<f64>,
        /// Flat indices of the elements; empty for dense tensors.
        #[prost(uint64, repeated, tag = "2")]
        pub keys: ::prost::alloc::vec::Vec<u64>,
        /// The per-instance shape; empty means one-dimensional.
        #[prost(uint64, repeated, tag = "3")]
        pub shape: ::prost::alloc::vec::Vec<u64>,
    }

    /// A dense or keyed-sparse tensor of 32-bit integers.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Int32Tensor {
        /// The elements, row-major.
        #[prost(int32, repeated, tag = "1")]
        pub values: ::prost::alloc::vec::Vec<i32>,
        /// Flat indices of the elements; empty for dense tensors.
        #[prost(uint64, repeated, tag = "2")]
        pub keys: ::prost::alloc::vec::Vec<u64>,
        /// The per-instance shape; empty means one-dimensional.
        #[prost(uint64, repeated, tag = "3")]
        pub shape: ::prost::alloc::vec::Vec<u64>,
    }

    /// One named value of a record.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Value {
        /// The tensor carried by this value.
        #[prost(oneof = "value::Kind", tags = "2, 3, 4, 5")]
        pub kind: ::core::option::Option<value::Kind>,
    }

    /// The value variants.
    pub mod value {
        /// The tensor carried by a [`Value`](super::Value).
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Kind {
            /// 32-bit float tensor.
            #[prost(message, tag = "2")]
            Float32Tensor(super::Float32Tensor),
            /// 64-bit float tensor.
            #[prost(message, tag = "3")]
            Float64Tensor(super::Float64Tensor),
            /// 32-bit integer tensor.
            #[prost(message, tag = "4")]
            Int32Tensor(super::Int32Tensor),
            /// Raw bytes.
            #[prost(bytes, tag = "5")]
            Bytes(::prost::alloc::vec::Vec<u8>),
        }
    }

    /// One instance: named features and labels.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Record {
        /// The feature values by name.
        #[prost(map = "string, message", tag = "1")]
        pub features: ::std::collections::HashMap<::prost::alloc::string::String, Value>,
        /// The label values by name.
        #[prost(map = "string, message", tag = "2")]
        pub label: ::std::collections::HashMap<::prost::alloc::string::String, Value>,
        /// Optional stable identifier of the instance.
        #[prost(string, tag = "3")]
        pub uid: ::prost::alloc::string::String,
        /// Optional free-form metadata.
        #[prost(string, tag = "4")]
        pub metadata: ::prost::alloc::string::String,
        /// Optional decode configuration.
        #[prost(string, tag = "5")]
        pub configuration: ::prost::alloc::string::String,
    }
}

/// Reads RecordIO-framed protobuf tensor records.
pub struct RecordIoProtobufReader {
    inner: ParallelDataReader,
}

impl RecordIoProtobufReader {
    /// Create a reader over `options`.
    pub fn new(options: ReaderOptions) -> Result<Self> {
        let format = Arc::new(RecordIoProtobufFormat {
            batch_size: options.batch_size,
            bad_example_handling: options.bad_example_handling,
            warn_bad_instances: options.warn_bad_instances,
        });

        Ok(RecordIoProtobufReader {
            inner: ParallelDataReader::new(options, format)?,
        })
    }
}

impl DataReader for RecordIoProtobufReader {
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

struct RecordIoProtobufFormat {
    batch_size: usize,
    bad_example_handling: BadExampleHandling,
    warn_bad_instances: bool,
}

fn find_value<'a>(record: &'a proto::Record, name: &str) -> Option<&'a proto::Value> {
    record.features.get(name).or_else(|| record.label.get(name))
}

fn value_kind<'a>(value: &'a proto::Value) -> Result<&'a proto::value::Kind> {
    value.kind.as_ref().ok_or_else(|| {
        DataReaderError::invalid_argument("the record value carries no tensor")
    })
}

/// The per-instance element count of a tensor value.
fn value_dimension(kind: &proto::value::Kind) -> u64 {
    use proto::value::Kind;

    let (shape, num_values) = match kind {
        Kind::Float32Tensor(t) => (&t.shape, t.values.len()),
        Kind::Float64Tensor(t) => (&t.shape, t.values.len()),
        Kind::Int32Tensor(t) => (&t.shape, t.values.len()),
        Kind::Bytes(bytes) => return bytes.len() as u64,
    };

    if shape.is_empty() {
        num_values as u64
    } else {
        shape.iter().product()
    }
}

fn value_is_sparse(kind: &proto::value::Kind) -> bool {
    use proto::value::Kind;

    match kind {
        Kind::Float32Tensor(t) => !t.keys.is_empty(),
        Kind::Float64Tensor(t) => !t.keys.is_empty(),
        Kind::Int32Tensor(t) => !t.keys.is_empty(),
        Kind::Bytes(_) => false,
    }
}

fn value_data_type(kind: &proto::value::Kind) -> DataType {
    use proto::value::Kind;

    match kind {
        Kind::Float32Tensor(_) => DataType::F32,
        Kind::Float64Tensor(_) => DataType::F64,
        Kind::Int32Tensor(_) => DataType::I32,
        Kind::Bytes(_) => DataType::U8,
    }
}

impl RecordIoProtobufFormat {
    fn parse_record(bits: &[u8]) -> std::result::Result<proto::Record, String> {
        proto::Record::decode(bits).map_err(|e| format!("the record is not a valid protobuf: {e}"))
    }

    /// Validate one record against the schema; the build step below can
    /// then assume conformance.
    fn validate_record(
        record: &proto::Record,
        attributes: &[Attribute],
    ) -> std::result::Result<(), String> {
        for attribute in attributes {
            let Some(value) = find_value(record, attribute.name()) else {
                return Err(format!(
                    "the record has no value named '{}'",
                    attribute.name()
                ));
            };

            let Some(kind) = value.kind.as_ref() else {
                return Err(format!(
                    "the value '{}' carries no tensor",
                    attribute.name()
                ));
            };

            if value_data_type(kind) != attribute.data_type() {
                return Err(format!(
                    "the value '{}' has type {} but the schema expects {}",
                    attribute.name(),
                    value_data_type(kind),
                    attribute.data_type()
                ));
            }

            if !attribute.sparse() {
                if value_is_sparse(kind) {
                    return Err(format!(
                        "the value '{}' is sparse but the schema expects dense",
                        attribute.name()
                    ));
                }

                if value_dimension(kind) != attribute.shape()[1] {
                    return Err(format!(
                        "the value '{}' has {} element(s) but the schema expects {}",
                        attribute.name(),
                        value_dimension(kind),
                        attribute.shape()[1]
                    ));
                }
            }
        }

        Ok(())
    }

    fn build_dense(
        attribute: &Attribute,
        records: &[proto::Record],
        batch_len: usize,
    ) -> Result<Tensor> {
        use proto::value::Kind;

        let dimension = attribute.shape()[1] as usize;

        let data = match attribute.data_type() {
            DataType::F32 => {
                let mut values = Vec::with_capacity(batch_len * dimension);
                for record in records {
                    if let Some(Kind::Float32Tensor(t)) =
                        find_value(record, attribute.name()).and_then(|v| v.kind.as_ref())
                    {
                        values.extend_from_slice(&t.values);
                    }
                }
                values.resize(batch_len * dimension, 0.0);

                TensorData::F32(values)
            }
            DataType::F64 => {
                let mut values = Vec::with_capacity(batch_len * dimension);
                for record in records {
                    if let Some(Kind::Float64Tensor(t)) =
                        find_value(record, attribute.name()).and_then(|v| v.kind.as_ref())
                    {
                        values.extend_from_slice(&t.values);
                    }
                }
                values.resize(batch_len * dimension, 0.0);

                TensorData::F64(values)
            }
            DataType::I32 => {
                let mut values = Vec::with_capacity(batch_len * dimension);
                for record in records {
                    if let Some(Kind::Int32Tensor(t)) =
                        find_value(record, attribute.name()).and_then(|v| v.kind.as_ref())
                    {
                        values.extend_from_slice(&t.values);
                    }
                }
                values.resize(batch_len * dimension, 0);

                TensorData::I32(values)
            }
            DataType::U8 => {
                let mut values = Vec::with_capacity(batch_len * dimension);
                for record in records {
                    if let Some(Kind::Bytes(bytes)) =
                        find_value(record, attribute.name()).and_then(|v| v.kind.as_ref())
                    {
                        values.extend_from_slice(bytes);
                    }
                }
                values.resize(batch_len * dimension, 0);

                TensorData::U8(ByteBuffer::Owned(values))
            }
            other => {
                return Err(DataReaderError::not_supported(format!(
                    "{other} record values are not supported"
                )));
            }
        };

        Ok(Tensor::Dense(DenseTensor::new(
            vec![batch_len as u64, dimension as u64],
            data,
        )?))
    }

    fn build_sparse(
        attribute: &Attribute,
        records: &[proto::Record],
        batch_len: usize,
    ) -> Result<Tensor> {
        use proto::value::Kind;

        let mut rows = Vec::new();
        let mut columns = Vec::new();
        let mut dimension = attribute.shape()[1];

        enum Values {
            F32(Vec<f32>),
            F64(Vec<f64>),
            I32(Vec<i32>),
        }

        let mut values = match attribute.data_type() {
            DataType::F32 => Values::F32(Vec::new()),
            DataType::F64 => Values::F64(Vec::new()),
            DataType::I32 => Values::I32(Vec::new()),
            other => {
                return Err(DataReaderError::not_supported(format!(
                    "{other} sparse record values are not supported"
                )));
            }
        };

        for (row, record) in records.iter().enumerate() {
            let Some(kind) = find_value(record, attribute.name()).and_then(|v| v.kind.as_ref())
            else {
                continue;
            };

            let keys = match (kind, &mut values) {
                (Kind::Float32Tensor(t), Values::F32(values)) => {
                    values.extend_from_slice(&t.values);
                    &t.keys
                }
                (Kind::Float64Tensor(t), Values::F64(values)) => {
                    values.extend_from_slice(&t.values);
                    &t.keys
                }
                (Kind::Int32Tensor(t), Values::I32(values)) => {
                    values.extend_from_slice(&t.values);
                    &t.keys
                }
                _ => continue,
            };

            for &key in keys {
                rows.push(row as u64);
                columns.push(key);

                // Sparse values are free to address past the dimension
                // seen during inference; widen the shape instead of
                // failing.
                if key >= dimension {
                    dimension = key + 1;
                }
            }
        }

        let data = match values {
            Values::F32(values) => TensorData::F32(values),
            Values::F64(values) => TensorData::F64(values),
            Values::I32(values) => TensorData::I32(values),
        };

        Ok(Tensor::Coo(CooTensor::new(
            vec![batch_len as u64, dimension],
            data,
            vec![rows, columns],
        )?))
    }
}

impl DataFormat for RecordIoProtobufFormat {
    fn make_record_reader(&self, store: &dyn DataStore) -> Result<Box<dyn RecordReader>> {
        let stream = store.open_read()?;

        Ok(Box::new(StreamRecordReader::new(
            RecordIoDecoder::new(),
            stream,
        )?))
    }

    fn infer_schema(&self, instance: Option<&Instance>) -> Result<Schema> {
        let Some(instance) = instance else {
            return Ok(Schema::new(Vec::new())?);
        };

        let record = Self::parse_record(instance.bits().as_bytes())
            .map_err(|message| DataReaderError::invalid_instance(instance.index(), message))?;

        let mut entries: Vec<(&String, &proto::Value)> =
            record.features.iter().chain(record.label.iter()).collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut attributes = Vec::with_capacity(entries.len());

        for (name, value) in entries {
            let kind = value_kind(value)?;

            attributes.push(
                Attribute::new(
                    name.clone(),
                    value_data_type(kind),
                    vec![self.batch_size as u64, value_dimension(kind)],
                )
                .with_sparse(value_is_sparse(kind)),
            );
        }

        Ok(Schema::new(attributes)?)
    }

    fn decode(&self, batch: &InstanceBatch, schema: &Arc<Schema>) -> Result<Example> {
        let instances = batch.instances();
        let batch_len = instances.len();
        let live = batch_len - batch.padding() as usize;
        let attributes = schema.attributes();

        let mut records = Vec::with_capacity(live);

        for instance in &instances[..live] {
            let parsed = Self::parse_record(instance.bits().as_bytes())
                .and_then(|record| {
                    Self::validate_record(&record, attributes).map(|()| record)
                });

            match parsed {
                Ok(record) => records.push(record),
                Err(message) => {
                    handle_bad_instance(
                        self.bad_example_handling,
                        self.warn_bad_instances,
                        instance,
                        &message,
                    )?;
                }
            }
        }

        let padding = (batch_len - records.len()) as u64;

        let features = attributes
            .iter()
            .map(|attribute| {
                if attribute.sparse() {
                    Self::build_sparse(attribute, &records, batch_len)
                } else {
                    Self::build_dense(attribute, &records, batch_len)
                }
            })
            .collect::<Result<Vec<Tensor>>>()?;

        Ok(Example::with_padding(Arc::clone(schema), features, padding)?)
    }
}

/// Encode one record as a protobuf payload; used to build datasets in
/// tests and by hosts that write fixtures.
pub fn encode_record(
    features: &[(&str, proto::value::Kind)],
    labels: &[(&str, proto::value::Kind)],
) -> Vec<u8> {
    let to_map = |entries: &[(&str, proto::value::Kind)]| {
        entries
            .iter()
            .map(|(name, kind)| {
                (
                    name.to_string(),
                    proto::Value {
                        kind: Some(kind.clone()),
                    },
                )
            })
            .collect::<HashMap<_, _>>()
    };

    let record = proto::Record {
        features: to_map(features),
        label: to_map(labels),
        uid: String::new(),
        metadata: String::new(),
        configuration: String::new(),
    };

    record.encode_to_vec()
}
