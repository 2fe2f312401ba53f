// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # mlfeed
//!
//! High-throughput parallel dataset reader that feeds batched tensors to
//! machine-learning trainers.
//!
//! A reader takes a heterogeneous dataset (local files, object-storage
//! blobs, in-memory buffers) in one of several wire formats (CSV, text
//! lines, binary RecordIO, length-prefixed protobuf records, images,
//! Parquet framing) and produces an ordered stream of **examples**:
//! batches of fixed-schema, named, typed tensors.
//!
//! Internally the pipeline is layered: chunk readers amortize I/O and
//! preserve leftovers, record readers frame chunks into records,
//! instance readers implement range selection, sharding, sampling, and
//! windowed shuffling, the batcher groups instances with configurable
//! tail handling, and a parallel decode graph pipelines I/O, decode, and
//! reordering across worker threads while preserving per-example order
//! and applying backpressure.
//!
//! ## Example: reading text lines
//!
//! ```rust,no_run
//! # fn main() -> Result<(), mlfeed::DataReaderError> {
//! use std::sync::Arc;
//!
//! use mlfeed::{DataReader, DataStore, ReaderOptions, TextLineReader};
//!
//! let store: Arc<dyn DataStore> = Arc::new(mlfeed::File::new("train.txt"));
//!
//! let options = ReaderOptions::new(vec![store]).with_batch_size(32);
//! let mut reader = TextLineReader::new(options)?;
//!
//! while let Some(example) = reader.read_example()? {
//!     let lines = example.feature("value").unwrap();
//!     println!("batch of {:?}", lines.shape());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: deterministic shuffling over shards
//!
//! ```rust,no_run
//! # fn main() -> Result<(), mlfeed::DataReaderError> {
//! use std::sync::Arc;
//!
//! use mlfeed::{CsvReader, CsvReaderOptions, DataReader, DataStore, ReaderOptions};
//!
//! let stores: Vec<Arc<dyn DataStore>> =
//!     mlfeed::list_files(&["data/"], &mlfeed::FileListOptions::default())?
//!         .into_iter()
//!         .map(|f| Arc::new(f) as Arc<dyn DataStore>)
//!         .collect();
//!
//! let options = ReaderOptions::new(stores)
//!     .with_batch_size(64)
//!     .with_shard(0, 4)
//!     .with_shuffle_window(10_000)
//!     .with_shuffle_seed(42)
//!     .with_reshuffle_each_epoch(false);
//!
//! let mut reader = CsvReader::new(options, CsvReaderOptions::default())?;
//! let schema = reader.read_schema()?;
//! println!("{schema}");
//! # Ok(())
//! # }
//! ```

// Error types
pub mod error;

pub use error::{CorruptKind, DataReaderError, RecordError, Result, SchemaError, StreamError};

// Reference-counted memory blocks and slices
pub mod memory;

pub use memory::{
    memory_allocator, set_memory_allocator, FileBackedAllocator, HeapAllocator, MemoryAllocator,
    MemoryBlock, MemorySlice,
};

// Byte streams
pub mod streams;

pub use streams::{FileInputStream, InMemoryInputStream, InputStream, S3Client, S3InputStream};

// Data stores and listing helpers
pub mod data_stores;

pub use data_stores::{
    list_files, list_s3_objects, parse_s3_uri, Compression, DataStore, File, FileListOptions,
    InMemoryStore, S3Object,
};

// Record framing
pub mod records;

pub use records::{Record, RecordKind, RecordReader};

// The instance reader chain
pub mod instances;

pub use instances::{Instance, InstanceBatch, InstanceReader};

// Tensors, schemas, examples
pub mod tensor;

pub use tensor::{ByteBuffer, CooTensor, CsrTensor, DataType, DenseTensor, Tensor, TensorData};

pub mod example;
pub mod schema;

pub use example::Example;
pub use schema::{Attribute, Schema};

// The reader surface
pub mod reader;

pub use reader::{
    BadExampleHandling, CsvReader, CsvReaderOptions, DataFormat, DataReader, ImageDecoder,
    ImageFrame, ImageReader, ImageReaderOptions, LastExampleHandling, ParallelDataReader,
    RawImageDecoder, ReaderOptions, RecordIoProtobufReader, TextLineReader,
};
