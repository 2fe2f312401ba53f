// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Tensors: the typed payload of a decoded example.
//!
//! A [`Tensor`] is dense, COO-sparse, or CSR-sparse; its elements live in
//! a [`TensorData`] buffer discriminated by [`DataType`]. Dense byte
//! tensors can borrow a [`MemorySlice`] instead of owning their buffer,
//! preserving zero-copy from the record layer up to the trainer.

use std::fmt;

use crate::error::{DataReaderError, Result};
use crate::memory::MemorySlice;

/// The element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 16-bit float.
    F16,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// UTF-8 string.
    String,
    /// Machine-sized index.
    Size,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::F16 => "f16",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::I8 => "i8",
            DataType::I16 => "i16",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
            DataType::U8 => "u8",
            DataType::U16 => "u16",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
            DataType::String => "string",
            DataType::Size => "size",
        };

        f.write_str(name)
    }
}

/// A byte buffer that is either owned or borrowed from the record layer.
#[derive(Debug, Clone)]
pub enum ByteBuffer {
    /// The buffer owns its bytes.
    Owned(Vec<u8>),
    /// The buffer is a window into a shared memory block.
    Shared(MemorySlice),
}

impl ByteBuffer {
    /// The bytes of the buffer.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            ByteBuffer::Owned(bytes) => bytes,
            ByteBuffer::Shared(slice) => slice.as_bytes(),
        }
    }

    /// The number of bytes.
    pub fn len(&self) -> usize {
        match self {
            ByteBuffer::Owned(bytes) => bytes.len(),
            ByteBuffer::Shared(slice) => slice.len(),
        }
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The typed element buffer of a tensor.
#[derive(Debug, Clone)]
pub enum TensorData {
    /// 32-bit floats.
    F32(Vec<f32>),
    /// 64-bit floats.
    F64(Vec<f64>),
    /// 8-bit signed integers.
    I8(Vec<i8>),
    /// 16-bit signed integers.
    I16(Vec<i16>),
    /// 32-bit signed integers.
    I32(Vec<i32>),
    /// 64-bit signed integers.
    I64(Vec<i64>),
    /// Bytes, optionally backed by shared memory.
    U8(ByteBuffer),
    /// 16-bit unsigned integers.
    U16(Vec<u16>),
    /// 32-bit unsigned integers.
    U32(Vec<u32>),
    /// 64-bit unsigned integers.
    U64(Vec<u64>),
    /// UTF-8 strings.
    String(Vec<String>),
    /// Machine-sized indices.
    Size(Vec<u64>),
}

impl TensorData {
    /// The element type of the buffer.
    pub fn data_type(&self) -> DataType {
        match self {
            TensorData::F32(_) => DataType::F32,
            TensorData::F64(_) => DataType::F64,
            TensorData::I8(_) => DataType::I8,
            TensorData::I16(_) => DataType::I16,
            TensorData::I32(_) => DataType::I32,
            TensorData::I64(_) => DataType::I64,
            TensorData::U8(_) => DataType::U8,
            TensorData::U16(_) => DataType::U16,
            TensorData::U32(_) => DataType::U32,
            TensorData::U64(_) => DataType::U64,
            TensorData::String(_) => DataType::String,
            TensorData::Size(_) => DataType::Size,
        }
    }

    /// The number of elements in the buffer.
    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I8(v) => v.len(),
            TensorData::I16(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::U8(v) => v.len(),
            TensorData::U16(v) => v.len(),
            TensorData::U32(v) => v.len(),
            TensorData::U64(v) => v.len(),
            TensorData::String(v) => v.len(),
            TensorData::Size(v) => v.len(),
        }
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The elements as f32, if that is the element type.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            TensorData::F32(v) => Some(v),
            _ => None,
        }
    }

    /// The elements as f64, if that is the element type.
    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            TensorData::F64(v) => Some(v),
            _ => None,
        }
    }

    /// The elements as bytes, if that is the element type.
    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            TensorData::U8(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// The elements as strings, if that is the element type.
    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            TensorData::String(v) => Some(v),
            _ => None,
        }
    }
}

fn shape_len(shape: &[u64]) -> u64 {
    shape.iter().product()
}

/// A dense tensor: a shape and a contiguous element buffer.
#[derive(Debug, Clone)]
pub struct DenseTensor {
    shape: Vec<u64>,
    data: TensorData,
}

impl DenseTensor {
    /// Create a dense tensor; the element count must match the shape.
    pub fn new(shape: Vec<u64>, data: TensorData) -> Result<Self> {
        if shape_len(&shape) != data.len() as u64 {
            return Err(DataReaderError::invalid_argument(format!(
                "the tensor shape {:?} does not match its {} element(s)",
                shape,
                data.len()
            )));
        }

        Ok(DenseTensor { shape, data })
    }

    /// The shape of the tensor; the first dimension is the batch.
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// The element buffer.
    pub fn data(&self) -> &TensorData {
        &self.data
    }
}

/// A sparse tensor in coordinate format.
#[derive(Debug, Clone)]
pub struct CooTensor {
    shape: Vec<u64>,
    data: TensorData,
    coordinates: Vec<Vec<u64>>,
}

impl CooTensor {
    /// Create a COO tensor; one coordinate list per dimension, each as
    /// long as the element buffer.
    pub fn new(shape: Vec<u64>, data: TensorData, coordinates: Vec<Vec<u64>>) -> Result<Self> {
        if coordinates.len() != shape.len() {
            return Err(DataReaderError::invalid_argument(format!(
                "the tensor has {} dimension(s) but {} coordinate list(s)",
                shape.len(),
                coordinates.len()
            )));
        }

        if coordinates.iter().any(|c| c.len() != data.len()) {
            return Err(DataReaderError::invalid_argument(
                "every coordinate list must be as long as the element buffer",
            ));
        }

        Ok(CooTensor {
            shape,
            data,
            coordinates,
        })
    }

    /// The shape of the tensor.
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// The element buffer.
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// The coordinates, one list per dimension.
    pub fn coordinates(&self) -> &[Vec<u64>] {
        &self.coordinates
    }
}

/// A sparse matrix in compressed-sparse-row format.
#[derive(Debug, Clone)]
pub struct CsrTensor {
    shape: Vec<u64>,
    data: TensorData,
    row_offsets: Vec<u64>,
    column_indices: Vec<u64>,
}

impl CsrTensor {
    /// Create a CSR tensor over a two-dimensional shape.
    pub fn new(
        shape: Vec<u64>,
        data: TensorData,
        row_offsets: Vec<u64>,
        column_indices: Vec<u64>,
    ) -> Result<Self> {
        if shape.len() != 2 {
            return Err(DataReaderError::invalid_argument(
                "a CSR tensor must be two-dimensional",
            ));
        }

        if row_offsets.len() != shape[0] as usize + 1 {
            return Err(DataReaderError::invalid_argument(
                "the row offsets must have one entry per row plus one",
            ));
        }

        if column_indices.len() != data.len() {
            return Err(DataReaderError::invalid_argument(
                "the column indices must be as long as the element buffer",
            ));
        }

        Ok(CsrTensor {
            shape,
            data,
            row_offsets,
            column_indices,
        })
    }

    /// The shape of the tensor.
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// The element buffer.
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// The per-row offsets into the element buffer.
    pub fn row_offsets(&self) -> &[u64] {
        &self.row_offsets
    }

    /// The column index of each element.
    pub fn column_indices(&self) -> &[u64] {
        &self.column_indices
    }
}

/// A decoded feature tensor.
#[derive(Debug, Clone)]
pub enum Tensor {
    /// Dense layout.
    Dense(DenseTensor),
    /// Coordinate-format sparse layout.
    Coo(CooTensor),
    /// Compressed-sparse-row layout.
    Csr(CsrTensor),
}

impl Tensor {
    /// The element type of the tensor.
    pub fn data_type(&self) -> DataType {
        match self {
            Tensor::Dense(t) => t.data.data_type(),
            Tensor::Coo(t) => t.data.data_type(),
            Tensor::Csr(t) => t.data.data_type(),
        }
    }

    /// The shape of the tensor.
    pub fn shape(&self) -> &[u64] {
        match self {
            Tensor::Dense(t) => t.shape(),
            Tensor::Coo(t) => t.shape(),
            Tensor::Csr(t) => t.shape(),
        }
    }

    /// The dense representation, if the tensor is dense.
    pub fn as_dense(&self) -> Option<&DenseTensor> {
        match self {
            Tensor::Dense(t) => Some(t),
            _ => None,
        }
    }

    /// The COO representation, if the tensor is COO-sparse.
    pub fn as_coo(&self) -> Option<&CooTensor> {
        match self {
            Tensor::Coo(t) => Some(t),
            _ => None,
        }
    }
}
