// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The bottom of the instance reader stack: records to instances.

use std::sync::Arc;

use crate::data_stores::DataStore;
use crate::error::{RecordError, Result};
use crate::instances::{Instance, InstanceReaderBase, InstanceReaderCore};
use crate::memory::{MemoryBlock, MemorySlice};
use crate::records::{Record, RecordKind, RecordReader};

/// Opens one record reader per data store.
pub(crate) type RecordReaderFactory =
    Box<dyn FnMut(&dyn DataStore) -> Result<Box<dyn RecordReader>> + Send>;

/// Iterates the configured data stores and turns each record (or
/// assembled split record) into one instance.
pub(crate) struct CoreInstanceReader {
    base: InstanceReaderBase,
    stores: Vec<Arc<dyn DataStore>>,
    factory: RecordReaderFactory,
    next_store: usize,
    record_reader: Option<Box<dyn RecordReader>>,
    instance_index: u64,
}

impl CoreInstanceReader {
    pub(crate) fn new(stores: Vec<Arc<dyn DataStore>>, factory: RecordReaderFactory) -> Self {
        CoreInstanceReader {
            base: InstanceReaderBase::default(),
            stores,
            factory,
            next_store: 0,
            record_reader: None,
            instance_index: 0,
        }
    }

    /// The next record, transparently moving to the next store when the
    /// current one is exhausted.
    fn read_record(&mut self) -> Result<Option<Record>> {
        loop {
            if self.record_reader.is_none() && !self.open_next_store()? {
                return Ok(None);
            }

            if let Some(reader) = self.record_reader.as_mut() {
                match reader.read_record()? {
                    Some(record) => return Ok(Some(record)),
                    None => self.record_reader = None,
                }
            }
        }
    }

    /// The next record from the current store only; `None` when the
    /// store is exhausted.
    fn read_record_from_current_store(&mut self) -> Result<Option<Record>> {
        match self.record_reader.as_mut() {
            Some(reader) => Ok(reader.read_record()?),
            None => Ok(None),
        }
    }

    fn open_next_store(&mut self) -> Result<bool> {
        let Some(store) = self.stores.get(self.next_store) else {
            return Ok(false);
        };

        self.next_store += 1;
        self.record_reader = Some((self.factory)(store.as_ref())?);

        Ok(true)
    }

    fn read_record_payload(&mut self) -> Result<Option<MemorySlice>> {
        let Some(record) = self.read_record()? else {
            return Ok(None);
        };

        if record.kind() == RecordKind::Complete {
            return Ok(Some(record.into_payload()));
        }

        self.read_split_record_payload(record).map(Some)
    }

    /// Assemble a split instance: begin, middle(s), end. Split records
    /// never cross a store boundary.
    fn read_split_record_payload(&mut self, first: Record) -> Result<MemorySlice> {
        if first.kind() != RecordKind::Begin {
            return Err(corrupt_split(
                "the record is not the beginning of a split record",
            ));
        }

        let mut payloads = vec![first.into_payload()];

        loop {
            let Some(record) = self.read_record_from_current_store()? else {
                return Err(corrupt_split(
                    "the split record ends before its last part",
                ));
            };

            match record.kind() {
                RecordKind::Middle => payloads.push(record.into_payload()),
                RecordKind::End => {
                    payloads.push(record.into_payload());

                    break;
                }
                _ => {
                    return Err(corrupt_split(
                        "the record violates the begin, middle, end sequence of a split record",
                    ));
                }
            }
        }

        Ok(concatenate(&payloads))
    }
}

fn corrupt_split(message: &str) -> crate::error::DataReaderError {
    RecordError::corrupt_split_record(message).into()
}

fn concatenate(payloads: &[MemorySlice]) -> MemorySlice {
    let total: usize = payloads.iter().map(MemorySlice::len).sum();

    let mut buf = Vec::with_capacity(total);
    for payload in payloads {
        buf.extend_from_slice(payload.as_bytes());
    }

    MemorySlice::new(Arc::new(MemoryBlock::from_vec(buf)))
}

impl InstanceReaderCore for CoreInstanceReader {
    fn read_instance_core(&mut self) -> Result<Option<Instance>> {
        let Some(bits) = self.read_record_payload()? else {
            return Ok(None);
        };

        let instance = Instance::new(bits, self.instance_index);
        self.instance_index += 1;

        Ok(Some(instance))
    }

    fn reset_core(&mut self) {
        self.next_store = 0;
        self.record_reader = None;
        self.instance_index = 0;
    }

    fn base(&self) -> &InstanceReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut InstanceReaderBase {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_stores::InMemoryStore;
    use crate::instances::testing::drain;
    use crate::instances::InstanceReader;
    use crate::records::recordio::{encode_record, RecordIoDecoder};
    use crate::records::StreamRecordReader;

    fn recordio_factory() -> RecordReaderFactory {
        Box::new(|store| {
            Ok(Box::new(StreamRecordReader::new(
                RecordIoDecoder::new(),
                store.open_read()?,
            )?))
        })
    }

    fn store_of(frames: &[(RecordKind, &[u8])]) -> Arc<dyn DataStore> {
        let mut bytes = Vec::new();
        for (kind, payload) in frames {
            bytes.extend_from_slice(&encode_record(*kind, payload));
        }

        Arc::new(InMemoryStore::from_bytes(&bytes))
    }

    #[test]
    fn test_complete_records_become_instances() {
        let store = store_of(&[
            (RecordKind::Complete, b"one"),
            (RecordKind::Complete, b"two"),
        ]);
        let mut reader = CoreInstanceReader::new(vec![store], recordio_factory());

        assert_eq!(drain(&mut reader), vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn test_instances_span_stores_in_order() {
        let first = store_of(&[(RecordKind::Complete, b"a")]);
        let second = store_of(&[(RecordKind::Complete, b"b")]);
        let mut reader = CoreInstanceReader::new(vec![first, second], recordio_factory());

        let instances = drain(&mut reader);
        assert_eq!(instances, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn test_split_record_is_assembled() {
        let store = store_of(&[
            (RecordKind::Begin, b"he"),
            (RecordKind::Middle, b"ll"),
            (RecordKind::End, b"o!"),
            (RecordKind::Complete, b"bye"),
        ]);
        let mut reader = CoreInstanceReader::new(vec![store], recordio_factory());

        assert_eq!(drain(&mut reader), vec![b"hello!".to_vec(), b"bye".to_vec()]);
    }

    #[test]
    fn test_instance_indices_are_monotonic() {
        let store = store_of(&[
            (RecordKind::Complete, b"a"),
            (RecordKind::Begin, b"b"),
            (RecordKind::End, b"c"),
            (RecordKind::Complete, b"d"),
        ]);
        let mut reader = CoreInstanceReader::new(vec![store], recordio_factory());

        let mut indices = Vec::new();
        while let Some(instance) = reader.read_instance().unwrap() {
            indices.push(instance.index());
        }

        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_out_of_order_split_record_fails() {
        let store = store_of(&[(RecordKind::Middle, b"m")]);
        let mut reader = CoreInstanceReader::new(vec![store], recordio_factory());

        assert!(reader.read_instance().is_err());
    }

    #[test]
    fn test_unterminated_split_record_fails() {
        let store = store_of(&[(RecordKind::Begin, b"b"), (RecordKind::Middle, b"m")]);
        let mut reader = CoreInstanceReader::new(vec![store], recordio_factory());

        assert!(reader.read_instance().is_err());
    }

    #[test]
    fn test_split_record_may_not_cross_stores() {
        let first = store_of(&[(RecordKind::Begin, b"b")]);
        let second = store_of(&[(RecordKind::End, b"e")]);
        let mut reader = CoreInstanceReader::new(vec![first, second], recordio_factory());

        assert!(reader.read_instance().is_err());
    }

    #[test]
    fn test_reset_replays_from_first_store() {
        let store = store_of(&[(RecordKind::Complete, b"x")]);
        let mut reader = CoreInstanceReader::new(vec![store], recordio_factory());

        assert_eq!(drain(&mut reader).len(), 1);

        reader.reset();
        let instance = reader.read_instance().unwrap().unwrap();
        assert_eq!(instance.index(), 0);
        assert_eq!(instance.bits().as_bytes(), b"x");
    }
}
