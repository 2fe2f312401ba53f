// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CSV dataset reader.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::data_stores::DataStore;
use crate::error::{DataReaderError, RecordError, Result};
use crate::example::Example;
use crate::instances::{Instance, InstanceBatch};
use crate::reader::{
    handle_bad_instance, BadExampleHandling, DataFormat, DataReader, ParallelDataReader,
    ReaderOptions,
};
use crate::records::csv::{CsvFraming, CsvRecordDecoder};
use crate::records::{RecordReader, StreamRecordReader};
use crate::schema::{Attribute, Schema};
use crate::tensor::{ByteBuffer, DataType, DenseTensor, Tensor, TensorData};

/// CSV-specific reader options.
#[derive(Debug, Clone)]
pub struct CsvReaderOptions {
    /// Whether the first row of every store is a header; the first
    /// header seen provides the column names.
    pub has_header: bool,
    /// Explicit column names, overriding the header.
    pub column_names: Option<Vec<String>>,
    /// Prefix for generated column names when there is neither a header
    /// nor explicit names.
    pub name_prefix: String,
    /// The type every column defaults to; unset means per-column
    /// inference from the first data row (f32 if it parses, string
    /// otherwise).
    pub default_data_type: Option<DataType>,
    /// Per-column type overrides, by column name.
    pub column_types: HashMap<String, DataType>,
    /// The field delimiter.
    pub delimiter: u8,
    /// The quote character.
    pub quote_char: u8,
    /// Lines starting with this character are skipped.
    pub comment_char: Option<u8>,
    /// Whether quoted fields may contain literal newlines.
    pub allow_quoted_new_lines: bool,
    /// Whether blank lines are skipped.
    pub skip_blank_lines: bool,
    /// Bound on the line length.
    pub max_line_length: Option<usize>,
}

impl Default for CsvReaderOptions {
    fn default() -> Self {
        CsvReaderOptions {
            has_header: true,
            column_names: None,
            name_prefix: "column_".to_string(),
            default_data_type: None,
            column_types: HashMap::new(),
            delimiter: b',',
            quote_char: b'"',
            comment_char: None,
            allow_quoted_new_lines: false,
            skip_blank_lines: true,
            max_line_length: None,
        }
    }
}

impl CsvReaderOptions {
    /// Set whether the first row is a header.
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Set explicit column names.
    pub fn with_column_names(mut self, column_names: Vec<String>) -> Self {
        self.column_names = Some(column_names);
        self
    }

    /// Set the default column type.
    pub fn with_default_data_type(mut self, data_type: DataType) -> Self {
        self.default_data_type = Some(data_type);
        self
    }

    /// Override the type of one column.
    pub fn with_column_type(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.column_types.insert(name.into(), data_type);
        self
    }

    /// Set the field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the comment character.
    pub fn with_comment_char(mut self, comment_char: u8) -> Self {
        self.comment_char = Some(comment_char);
        self
    }

    /// Allow literal newlines inside quoted fields.
    pub fn with_allow_quoted_new_lines(mut self, allow: bool) -> Self {
        self.allow_quoted_new_lines = allow;
        self
    }
}

/// Reads CSV datasets into per-column dense tensors.
pub struct CsvReader {
    inner: ParallelDataReader,
}

impl CsvReader {
    /// Create a reader over `options`.
    pub fn new(options: ReaderOptions, csv_options: CsvReaderOptions) -> Result<Self> {
        let format = Arc::new(CsvFormat {
            batch_size: options.batch_size,
            bad_example_handling: options.bad_example_handling,
            warn_bad_instances: options.warn_bad_instances,
            options: csv_options,
            header: Mutex::new(None),
        });

        Ok(CsvReader {
            inner: ParallelDataReader::new(options, format)?,
        })
    }
}

impl DataReader for CsvReader {
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

struct CsvFormat {
    batch_size: usize,
    bad_example_handling: BadExampleHandling,
    warn_bad_instances: bool,
    options: CsvReaderOptions,
    /// Column names captured from the first header row seen.
    header: Mutex<Option<Vec<String>>>,
}

impl CsvFormat {
    fn framing(&self) -> CsvFraming {
        CsvFraming {
            delimiter: self.options.delimiter,
            quote_char: self.options.quote_char,
            comment_char: self.options.comment_char,
            allow_quoted_new_lines: self.options.allow_quoted_new_lines,
            skip_blank_lines: self.options.skip_blank_lines,
            max_line_length: self.options.max_line_length,
        }
    }

    fn tokenize(&self, line: &[u8]) -> std::result::Result<Vec<String>, RecordError> {
        tokenize(line, self.options.delimiter, self.options.quote_char)
    }

    fn column_type(
        &self,
        name: &str,
        column: usize,
        first_row: Option<&Vec<String>>,
    ) -> DataType {
        if let Some(data_type) = self.options.column_types.get(name) {
            return *data_type;
        }

        if let Some(data_type) = self.options.default_data_type {
            return data_type;
        }

        match first_row.and_then(|row| row.get(column)) {
            Some(field) if field.parse::<f32>().is_ok() => DataType::F32,
            Some(_) => DataType::String,
            None => DataType::F32,
        }
    }
}

impl DataFormat for CsvFormat {
    fn make_record_reader(&self, store: &dyn DataStore) -> Result<Box<dyn RecordReader>> {
        let stream = store.open_read()?;

        let mut reader = StreamRecordReader::new(CsvRecordDecoder::new(self.framing()), stream)?;

        if self.options.has_header {
            // Every store starts with a header row; the first one seen
            // provides the column names, the rest are just consumed.
            if let Some(record) = reader.read_record()? {
                let mut header = self.header.lock().unwrap_or_else(|e| e.into_inner());

                if header.is_none() {
                    *header = Some(self.tokenize(record.payload().as_bytes())?);
                }
            }
        }

        Ok(Box::new(reader))
    }

    fn infer_schema(&self, instance: Option<&Instance>) -> Result<Schema> {
        let first_row = match instance {
            Some(instance) => Some(self.tokenize(instance.bits().as_bytes())?),
            None => None,
        };

        let header = self
            .header
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let names: Vec<String> = if let Some(names) = &self.options.column_names {
            names.clone()
        } else if let Some(names) = header {
            names
        } else if let Some(row) = &first_row {
            (0..row.len())
                .map(|column| format!("{}{}", self.options.name_prefix, column))
                .collect()
        } else {
            // An empty dataset with no naming source has no columns.
            Vec::new()
        };

        let attributes = names
            .iter()
            .enumerate()
            .map(|(column, name)| {
                Attribute::new(
                    name.clone(),
                    self.column_type(name, column, first_row.as_ref()),
                    vec![self.batch_size as u64, 1],
                )
            })
            .collect();

        Ok(Schema::new(attributes)?)
    }

    fn decode(&self, batch: &InstanceBatch, schema: &Arc<Schema>) -> Result<Example> {
        let instances = batch.instances();
        let batch_len = instances.len();
        let live = batch_len - batch.padding() as usize;
        let attributes = schema.attributes();

        let mut rows: Vec<Vec<String>> = Vec::with_capacity(live);

        for instance in &instances[..live] {
            match self.parse_row(instance, attributes) {
                Ok(fields) => rows.push(fields),
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

        let padding = (batch_len - rows.len()) as u64;

        let features = attributes
            .iter()
            .enumerate()
            .map(|(column, attribute)| {
                let data = build_column(attribute.data_type(), &rows, column, batch_len)?;

                Ok(Tensor::Dense(DenseTensor::new(
                    vec![batch_len as u64, 1],
                    data,
                )?))
            })
            .collect::<Result<Vec<Tensor>>>()?;

        Ok(Example::with_padding(Arc::clone(schema), features, padding)?)
    }
}

impl CsvFormat {
    /// Tokenize and validate one instance against the schema; returns a
    /// message describing why the instance is bad.
    fn parse_row(
        &self,
        instance: &Instance,
        attributes: &[Attribute],
    ) -> std::result::Result<Vec<String>, String> {
        let fields = self
            .tokenize(instance.bits().as_bytes())
            .map_err(|e| e.to_string())?;

        if fields.len() != attributes.len() {
            return Err(format!(
                "the row has {} field(s) while the schema has {} column(s)",
                fields.len(),
                attributes.len()
            ));
        }

        for (field, attribute) in fields.iter().zip(attributes) {
            if !field_parses(attribute.data_type(), field) {
                return Err(format!(
                    "the field '{}' cannot be parsed as {}",
                    field,
                    attribute.data_type()
                ));
            }
        }

        Ok(fields)
    }
}

/// Split one CSV line into its fields.
///
/// Quoted fields may contain the delimiter; a doubled quote inside a
/// quoted field is a literal quote. The automaton mirrors the record
/// framing one, minus the line terminators the framing layer already
/// consumed.
pub(crate) fn tokenize(
    line: &[u8],
    delimiter: u8,
    quote_char: u8,
) -> std::result::Result<Vec<String>, RecordError> {
    #[derive(PartialEq)]
    enum State {
        NewField,
        InField,
        InQuotedField,
        QuoteInQuotedField,
    }

    let mut fields = Vec::new();
    let mut value = Vec::new();
    let mut state = State::NewField;

    for &chr in line {
        match state {
            State::NewField => {
                if chr == delimiter {
                    fields.push(String::new());
                } else if chr == quote_char {
                    state = State::InQuotedField;
                } else {
                    value.push(chr);
                    state = State::InField;
                }
            }
            State::InField => {
                if chr == delimiter {
                    fields.push(take_field(&mut value));
                    state = State::NewField;
                } else {
                    value.push(chr);
                }
            }
            State::InQuotedField => {
                if chr == quote_char {
                    state = State::QuoteInQuotedField;
                } else {
                    value.push(chr);
                }
            }
            State::QuoteInQuotedField => {
                if chr == delimiter {
                    fields.push(take_field(&mut value));
                    state = State::NewField;
                } else if chr == quote_char {
                    value.push(quote_char);
                    state = State::InQuotedField;
                } else {
                    value.push(chr);
                    state = State::InField;
                }
            }
        }
    }

    if state == State::InQuotedField {
        return Err(RecordError::corrupt_record(
            "EOF reached inside a quoted field",
        ));
    }

    fields.push(take_field(&mut value));

    Ok(fields)
}

fn take_field(value: &mut Vec<u8>) -> String {
    String::from_utf8_lossy(&std::mem::take(value)).into_owned()
}

fn field_parses(data_type: DataType, field: &str) -> bool {
    match data_type {
        DataType::F16 => false,
        DataType::F32 => field.parse::<f32>().is_ok(),
        DataType::F64 => field.parse::<f64>().is_ok(),
        DataType::I8 => field.parse::<i8>().is_ok(),
        DataType::I16 => field.parse::<i16>().is_ok(),
        DataType::I32 => field.parse::<i32>().is_ok(),
        DataType::I64 => field.parse::<i64>().is_ok(),
        DataType::U8 => field.parse::<u8>().is_ok(),
        DataType::U16 => field.parse::<u16>().is_ok(),
        DataType::U32 => field.parse::<u32>().is_ok(),
        DataType::U64 | DataType::Size => field.parse::<u64>().is_ok(),
        DataType::String => true,
    }
}

macro_rules! numeric_column {
    ($variant:ident, $ty:ty, $rows:expr, $column:expr, $len:expr) => {{
        let mut values: Vec<$ty> = $rows
            .iter()
            .map(|row| row[$column].parse::<$ty>().unwrap_or_default())
            .collect();
        values.resize($len, Default::default());

        TensorData::$variant(values)
    }};
}

fn build_column(
    data_type: DataType,
    rows: &[Vec<String>],
    column: usize,
    batch_len: usize,
) -> Result<TensorData> {
    let data = match data_type {
        DataType::F16 => {
            return Err(DataReaderError::not_supported(
                "f16 CSV columns are not supported",
            ));
        }
        DataType::F32 => numeric_column!(F32, f32, rows, column, batch_len),
        DataType::F64 => numeric_column!(F64, f64, rows, column, batch_len),
        DataType::I8 => numeric_column!(I8, i8, rows, column, batch_len),
        DataType::I16 => numeric_column!(I16, i16, rows, column, batch_len),
        DataType::I32 => numeric_column!(I32, i32, rows, column, batch_len),
        DataType::I64 => numeric_column!(I64, i64, rows, column, batch_len),
        DataType::U16 => numeric_column!(U16, u16, rows, column, batch_len),
        DataType::U32 => numeric_column!(U32, u32, rows, column, batch_len),
        DataType::U64 => numeric_column!(U64, u64, rows, column, batch_len),
        DataType::Size => numeric_column!(Size, u64, rows, column, batch_len),
        DataType::U8 => {
            let mut values: Vec<u8> = rows
                .iter()
                .map(|row| row[column].parse::<u8>().unwrap_or_default())
                .collect();
            values.resize(batch_len, 0);

            TensorData::U8(ByteBuffer::Owned(values))
        }
        DataType::String => {
            let mut values: Vec<String> =
                rows.iter().map(|row| row[column].clone()).collect();
            values.resize_with(batch_len, String::new);

            TensorData::String(values)
        }
    };

    Ok(data)
}
