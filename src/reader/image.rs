// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Image dataset reader.
//!
//! Frames images out of RecordIO streams or whole-file blobs and emits
//! one `[batch, channels, height, width]` byte tensor per example. The
//! pixel decoding itself (JPEG/PNG decompression, resizing, color-space
//! conversion) is an external collaborator behind the [`ImageDecoder`]
//! trait; the built-in [`RawImageDecoder`] handles pre-decoded pixel
//! buffers.

use std::sync::Arc;

use crate::data_stores::DataStore;
use crate::error::{DataReaderError, Result};
use crate::example::Example;
use crate::instances::{Instance, InstanceBatch};
use crate::reader::{
    handle_bad_instance, BadExampleHandling, DataFormat, DataReader, ParallelDataReader,
    ReaderOptions,
};
use crate::records::blob::BlobDecoder;
use crate::records::recordio::RecordIoDecoder;
use crate::records::{RecordReader, StreamRecordReader};
use crate::schema::{Attribute, Schema};
use crate::tensor::{ByteBuffer, DataType, DenseTensor, Tensor, TensorData};

/// How images are framed in the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFrame {
    /// One image per store; the store boundary is the record boundary.
    #[default]
    Raw,
    /// Images wrapped in RecordIO frames.
    RecordIo,
}

/// Converts one encoded image into a pixel buffer of the requested
/// dimensions.
pub trait ImageDecoder: Send + Sync {
    /// Decode `encoded` into exactly
    /// `dimensions[0] * dimensions[1] * dimensions[2]` bytes
    /// (channels, height, width).
    fn decode_image(
        &self,
        encoded: &[u8],
        dimensions: [usize; 3],
    ) -> std::result::Result<Vec<u8>, String>;
}

/// Pass-through decoder for instances that already carry raw pixels.
#[derive(Debug, Default)]
pub struct RawImageDecoder;

impl ImageDecoder for RawImageDecoder {
    fn decode_image(
        &self,
        encoded: &[u8],
        dimensions: [usize; 3],
    ) -> std::result::Result<Vec<u8>, String> {
        let expected: usize = dimensions.iter().product();

        if encoded.len() != expected {
            return Err(format!(
                "the image has {} byte(s) but the configured dimensions require {}",
                encoded.len(),
                expected
            ));
        }

        Ok(encoded.to_vec())
    }
}

/// Image-specific reader options.
#[derive(Clone)]
pub struct ImageReaderOptions {
    /// How images are framed.
    pub image_frame: ImageFrame,
    /// Per-image dimensions: channels, height, width.
    pub image_dimensions: [usize; 3],
    /// The pixel decoder; unset means [`RawImageDecoder`].
    pub decoder: Option<Arc<dyn ImageDecoder>>,
}

impl ImageReaderOptions {
    /// Options for images of the given dimensions (channels, height,
    /// width).
    pub fn new(image_dimensions: [usize; 3]) -> Self {
        ImageReaderOptions {
            image_frame: ImageFrame::Raw,
            image_dimensions,
            decoder: None,
        }
    }

    /// Set the framing.
    pub fn with_image_frame(mut self, image_frame: ImageFrame) -> Self {
        self.image_frame = image_frame;
        self
    }

    /// Plug in an external pixel decoder.
    pub fn with_decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }
}

/// Reads image datasets into `[batch, channels, height, width]` byte
/// tensors.
pub struct ImageReader {
    inner: ParallelDataReader,
}

impl ImageReader {
    /// Create a reader over `options`.
    pub fn new(options: ReaderOptions, image_options: ImageReaderOptions) -> Result<Self> {
        if image_options.image_dimensions.iter().any(|&d| d == 0) {
            return Err(DataReaderError::invalid_argument(
                "the image dimensions must all be non-zero",
            ));
        }

        let decoder = image_options
            .decoder
            .clone()
            .unwrap_or_else(|| Arc::new(RawImageDecoder));

        let format = Arc::new(ImageFormat {
            batch_size: options.batch_size,
            bad_example_handling: options.bad_example_handling,
            warn_bad_instances: options.warn_bad_instances,
            image_frame: image_options.image_frame,
            image_dimensions: image_options.image_dimensions,
            decoder,
        });

        Ok(ImageReader {
            inner: ParallelDataReader::new(options, format)?,
        })
    }
}

impl DataReader for ImageReader {
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

struct ImageFormat {
    batch_size: usize,
    bad_example_handling: BadExampleHandling,
    warn_bad_instances: bool,
    image_frame: ImageFrame,
    image_dimensions: [usize; 3],
    decoder: Arc<dyn ImageDecoder>,
}

impl ImageFormat {
    fn image_size(&self) -> usize {
        self.image_dimensions.iter().product()
    }
}

impl DataFormat for ImageFormat {
    fn make_record_reader(&self, store: &dyn DataStore) -> Result<Box<dyn RecordReader>> {
        let stream = store.open_read()?;

        match self.image_frame {
            ImageFrame::Raw => Ok(Box::new(StreamRecordReader::new(BlobDecoder::new(), stream)?)),
            ImageFrame::RecordIo => Ok(Box::new(StreamRecordReader::new(
                RecordIoDecoder::new(),
                stream,
            )?)),
        }
    }

    fn infer_schema(&self, _instance: Option<&Instance>) -> Result<Schema> {
        let [channels, height, width] = self.image_dimensions;

        Ok(Schema::new(vec![Attribute::new(
            "value",
            DataType::U8,
            vec![
                self.batch_size as u64,
                channels as u64,
                height as u64,
                width as u64,
            ],
        )])?)
    }

    fn decode(&self, batch: &InstanceBatch, schema: &Arc<Schema>) -> Result<Example> {
        let instances = batch.instances();
        let batch_len = instances.len();
        let live = batch_len - batch.padding() as usize;
        let image_size = self.image_size();

        let [channels, height, width] = self.image_dimensions;
        let shape = vec![
            batch_len as u64,
            channels as u64,
            height as u64,
            width as u64,
        ];

        // One raw pre-decoded image can be handed to the trainer without
        // a copy: the tensor borrows the record payload.
        if batch_len == 1 && live == 1 && self.image_frame == ImageFrame::Raw {
            let bits = instances[0].bits();

            if bits.len() == image_size {
                let tensor = Tensor::Dense(DenseTensor::new(
                    shape,
                    TensorData::U8(ByteBuffer::Shared(bits.clone())),
                )?);

                return Ok(Example::new(Arc::clone(schema), vec![tensor])?);
            }
        }

        let mut pixels = Vec::with_capacity(batch_len * image_size);

        for instance in &instances[..live] {
            match self
                .decoder
                .decode_image(instance.bits().as_bytes(), self.image_dimensions)
            {
                Ok(image) if image.len() == image_size => pixels.extend_from_slice(&image),
                Ok(image) => {
                    handle_bad_instance(
                        self.bad_example_handling,
                        self.warn_bad_instances,
                        instance,
                        &format!(
                            "the decoded image has {} byte(s) instead of {image_size}",
                            image.len()
                        ),
                    )?;
                }
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

        let padding = (batch_len - pixels.len() / image_size) as u64;
        pixels.resize(batch_len * image_size, 0);

        let tensor = Tensor::Dense(DenseTensor::new(
            shape,
            TensorData::U8(ByteBuffer::Owned(pixels)),
        )?);

        Ok(Example::with_padding(
            Arc::clone(schema),
            vec![tensor],
            padding,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_stores::InMemoryStore;
    use crate::records::recordio::encode_record;
    use crate::records::RecordKind;

    #[test]
    fn test_raw_single_image_is_zero_copy() {
        let pixels: Vec<u8> = (0..12).collect();
        let store: Arc<dyn DataStore> = Arc::new(InMemoryStore::from_bytes(&pixels));

        let options = ReaderOptions::new(vec![store]).with_batch_size(1);
        let image_options = ImageReaderOptions::new([3, 2, 2]);

        let mut reader = ImageReader::new(options, image_options).unwrap();

        let example = reader.read_example().unwrap().unwrap();
        let tensor = example.feature("value").unwrap().as_dense().unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);
        assert_eq!(tensor.data().as_u8().unwrap(), pixels.as_slice());
        assert!(matches!(
            tensor.data(),
            TensorData::U8(ByteBuffer::Shared(_))
        ));
    }

    #[test]
    fn test_recordio_framed_images() {
        let first: Vec<u8> = vec![1; 4];
        let second: Vec<u8> = vec![2; 4];

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&encode_record(RecordKind::Complete, &first));
        bytes.extend_from_slice(&encode_record(RecordKind::Complete, &second));

        let store: Arc<dyn DataStore> = Arc::new(InMemoryStore::from_bytes(&bytes));

        let options = ReaderOptions::new(vec![store]).with_batch_size(2);
        let image_options =
            ImageReaderOptions::new([1, 2, 2]).with_image_frame(ImageFrame::RecordIo);

        let mut reader = ImageReader::new(options, image_options).unwrap();

        let example = reader.read_example().unwrap().unwrap();
        let tensor = example.feature("value").unwrap().as_dense().unwrap();

        assert_eq!(tensor.shape(), &[2, 1, 2, 2]);
        assert_eq!(tensor.data().as_u8().unwrap(), &[1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_wrong_size_image_is_an_error() {
        let store: Arc<dyn DataStore> = Arc::new(InMemoryStore::from_bytes(&[0u8; 5]));

        let options = ReaderOptions::new(vec![store]).with_batch_size(1);
        let image_options = ImageReaderOptions::new([1, 2, 2]);

        let mut reader = ImageReader::new(options, image_options).unwrap();

        assert!(reader.read_example().is_err());
    }
}
