// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The instance reader chain.
//!
//! An instance is one logical datum: a parsed record, or the
//! concatenation of a split record's parts. Instance readers form a
//! stack; every stage exposes the same read/peek/reset surface, and
//! [`make_instance_reader`] composes the stack from the reader options,
//! outermost to innermost: shuffle, sample, shard, range, core. A layer
//! is omitted when its options are defaults.

mod batch;
mod core;
mod range;
mod sample;
mod shard;
mod shuffle;

pub(crate) use batch::InstanceBatchReader;
pub(crate) use self::core::{CoreInstanceReader, RecordReaderFactory};
pub(crate) use range::RangedInstanceReader;
pub(crate) use sample::SampledInstanceReader;
pub(crate) use shard::ShardedInstanceReader;
pub(crate) use shuffle::ShuffledInstanceReader;

use std::sync::Arc;

use crate::error::Result;
use crate::memory::MemorySlice;
use crate::reader::ReaderOptions;

/// One logical datum read from the dataset.
#[derive(Debug, Clone)]
pub struct Instance {
    bits: MemorySlice,
    index: u64,
}

impl Instance {
    /// Create an instance over `bits` with the given epoch-monotonic
    /// index.
    pub fn new(bits: MemorySlice, index: u64) -> Self {
        Instance { bits, index }
    }

    /// A sentinel instance used to pad short batches.
    pub(crate) fn padding() -> Self {
        Instance {
            bits: MemorySlice::empty(),
            index: u64::MAX,
        }
    }

    /// The payload bytes of the instance.
    pub fn bits(&self) -> &MemorySlice {
        &self.bits
    }

    /// The position of the instance within the epoch, monotonic in the
    /// order the core reader produced it.
    pub fn index(&self) -> u64 {
        self.index
    }
}

/// An ordered group of instances assembled by the batch reader.
#[derive(Debug, Clone)]
pub struct InstanceBatch {
    instances: Vec<Instance>,
    index: u64,
    size_bytes: u64,
    padding: u64,
}

impl InstanceBatch {
    pub(crate) fn new(instances: Vec<Instance>, index: u64, size_bytes: u64, padding: u64) -> Self {
        InstanceBatch {
            instances,
            index,
            size_bytes,
            padding,
        }
    }

    /// The instances of the batch; under `pad*` last-example handling the
    /// last [`padding`](Self::padding) entries are sentinels.
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// The position of the batch within the epoch.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// The total payload size of the real instances in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// How many trailing instances are padding sentinels.
    pub fn padding(&self) -> u64 {
        self.padding
    }
}

/// A stage of the instance reader stack.
pub trait InstanceReader: Send {
    /// Return the next instance, or `None` at end-of-epoch.
    fn read_instance(&mut self) -> Result<Option<Instance>>;

    /// Return the next instance without consuming it.
    fn peek_instance(&mut self) -> Result<Option<Instance>>;

    /// Rewind the stage (and everything below it) to the beginning of
    /// the dataset.
    fn reset(&mut self);

    /// The number of instance payload bytes this stage has produced.
    fn num_bytes_read(&self) -> u64;
}

/// Peek slot and byte accounting shared by every stage.
#[derive(Debug, Default)]
pub(crate) struct InstanceReaderBase {
    peeked: Option<Instance>,
    num_bytes_read: u64,
}

/// The stage-specific half of an instance reader; the shared read/peek
/// protocol is layered on top by the blanket [`InstanceReader`] impl.
pub(crate) trait InstanceReaderCore: Send {
    fn read_instance_core(&mut self) -> Result<Option<Instance>>;

    fn reset_core(&mut self);

    fn base(&self) -> &InstanceReaderBase;

    fn base_mut(&mut self) -> &mut InstanceReaderBase;
}

impl<T: InstanceReaderCore> InstanceReader for T {
    fn read_instance(&mut self) -> Result<Option<Instance>> {
        let instance = match self.base_mut().peeked.take() {
            Some(instance) => Some(instance),
            None => self.read_instance_core()?,
        };

        if let Some(instance) = &instance {
            self.base_mut().num_bytes_read += instance.bits().len() as u64;
        }

        Ok(instance)
    }

    fn peek_instance(&mut self) -> Result<Option<Instance>> {
        if self.base().peeked.is_none() {
            let instance = self.read_instance_core()?;
            self.base_mut().peeked = instance;
        }

        Ok(self.base().peeked.clone())
    }

    fn reset(&mut self) {
        self.reset_core();

        let base = self.base_mut();
        base.peeked = None;
        base.num_bytes_read = 0;
    }

    fn num_bytes_read(&self) -> u64 {
        self.base().num_bytes_read
    }
}

/// Compose the instance reader stack for `options`.
///
/// Layer composition order, outer to inner:
/// shuffle, sample, shard, range, core.
pub(crate) fn make_instance_reader(
    options: &Arc<ReaderOptions>,
    factory: RecordReaderFactory,
) -> Result<Box<dyn InstanceReader>> {
    let mut reader: Box<dyn InstanceReader> =
        Box::new(CoreInstanceReader::new(options.dataset.clone(), factory));

    if options.num_instances_to_skip > 0 || options.num_instances_to_read.is_some() {
        reader = Box::new(RangedInstanceReader::new(
            options.num_instances_to_skip,
            options.num_instances_to_read,
            reader,
        ));
    }

    if options.num_shards > 1 {
        reader = Box::new(ShardedInstanceReader::new(
            options.shard_index,
            options.num_shards,
            reader,
        )?);
    }

    if let Some(ratio) = options.sample_ratio {
        reader = Box::new(SampledInstanceReader::new(ratio, reader)?);
    }

    if options.shuffle_instances {
        reader = Box::new(ShuffledInstanceReader::new(
            options.shuffle_window,
            options.shuffle_seed,
            options.reshuffle_each_epoch,
            reader,
        ));
    }

    Ok(reader)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A reader over pre-baked instances, for exercising single stages.
    pub(crate) struct VecInstanceReader {
        base: InstanceReaderBase,
        payloads: Vec<Vec<u8>>,
        position: usize,
    }

    impl VecInstanceReader {
        pub(crate) fn new(payloads: Vec<Vec<u8>>) -> Self {
            VecInstanceReader {
                base: InstanceReaderBase::default(),
                payloads,
                position: 0,
            }
        }

        /// A reader over `count` single-byte instances `0..count`.
        pub(crate) fn counting(count: usize) -> Self {
            VecInstanceReader::new((0..count).map(|i| vec![i as u8]).collect())
        }
    }

    impl InstanceReaderCore for VecInstanceReader {
        fn read_instance_core(&mut self) -> Result<Option<Instance>> {
            let Some(payload) = self.payloads.get(self.position) else {
                return Ok(None);
            };

            let instance = Instance::new(MemorySlice::copy_of(payload), self.position as u64);
            self.position += 1;

            Ok(Some(instance))
        }

        fn reset_core(&mut self) {
            self.position = 0;
        }

        fn base(&self) -> &InstanceReaderBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut InstanceReaderBase {
            &mut self.base
        }
    }

    /// Drain a reader into its payload bytes.
    pub(crate) fn drain(reader: &mut dyn InstanceReader) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(instance) = reader.read_instance().unwrap() {
            out.push(instance.bits().as_bytes().to_vec());
        }

        out
    }
}
