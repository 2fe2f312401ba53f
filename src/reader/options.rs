// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Reader configuration.

use std::sync::Arc;

use crate::data_stores::DataStore;
use crate::error::{DataReaderError, Result};

/// What to do when the tail of an epoch does not fill a whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastExampleHandling {
    /// Emit an example whose batch dimension is smaller than the
    /// configured batch size.
    #[default]
    None,
    /// Drop the last example.
    Drop,
    /// Drop the last example and warn.
    DropWarn,
    /// Pad the feature tensors with zeros up to the batch size; the
    /// example records how much padding was applied.
    Pad,
    /// Pad up to the batch size and warn.
    PadWarn,
}

/// What to do when a batch fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadExampleHandling {
    /// Latch the error and surface it on the next read; the reader then
    /// stays faulted until reset.
    #[default]
    Error,
    /// Skip the example.
    Skip,
    /// Skip the example and warn.
    SkipWarn,
    /// Skip the bad instances and pad the example to the batch size.
    Pad,
    /// Skip the bad instances, pad, and warn.
    PadWarn,
}

/// The parameters common to all data readers.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// The ordered list of data stores that form the dataset.
    pub dataset: Vec<Arc<dyn DataStore>>,
    /// How many instances are packed into a single example.
    pub batch_size: usize,
    /// How many examples to prefetch in background; zero means the
    /// number of processor cores.
    pub num_prefetched_examples: usize,
    /// Decoder concurrency; zero means `num_prefetched_examples`.
    pub num_parallel_reads: usize,
    /// See [`LastExampleHandling`].
    pub last_example_handling: LastExampleHandling,
    /// See [`BadExampleHandling`].
    pub bad_example_handling: BadExampleHandling,
    /// Whether to emit a diagnostic for every discarded bad instance.
    pub warn_bad_instances: bool,
    /// How many instances to skip from the beginning of the dataset.
    pub num_instances_to_skip: u64,
    /// How many instances to read after the skip; the rest of the
    /// dataset is ignored.
    pub num_instances_to_read: Option<u64>,
    /// The index of the shard to read.
    pub shard_index: u64,
    /// How many shards the dataset is split into; values above one
    /// enable sharding.
    pub num_shards: u64,
    /// Proportional subsampling ratio in (0, 1).
    pub sample_ratio: Option<f32>,
    /// Whether to shuffle instances while reading.
    pub shuffle_instances: bool,
    /// The shuffle reservoir size; zero means a perfect shuffle of the
    /// whole epoch.
    pub shuffle_window: usize,
    /// The shuffle seed; unset means a seed drawn once from OS entropy.
    pub shuffle_seed: Option<u64>,
    /// Whether every epoch is reshuffled, or the first epoch's order is
    /// replayed after each reset.
    pub reshuffle_each_epoch: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            dataset: Vec::new(),
            batch_size: 1,
            num_prefetched_examples: 0,
            num_parallel_reads: 0,
            last_example_handling: LastExampleHandling::None,
            bad_example_handling: BadExampleHandling::Error,
            warn_bad_instances: false,
            num_instances_to_skip: 0,
            num_instances_to_read: None,
            shard_index: 0,
            num_shards: 1,
            sample_ratio: None,
            shuffle_instances: false,
            shuffle_window: 0,
            shuffle_seed: None,
            reshuffle_each_epoch: true,
        }
    }
}

impl ReaderOptions {
    /// Options over the given dataset, everything else at defaults.
    pub fn new(dataset: Vec<Arc<dyn DataStore>>) -> Self {
        ReaderOptions {
            dataset,
            ..ReaderOptions::default()
        }
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the prefetch depth.
    pub fn with_num_prefetched_examples(mut self, num_prefetched_examples: usize) -> Self {
        self.num_prefetched_examples = num_prefetched_examples;
        self
    }

    /// Set the decoder concurrency.
    pub fn with_num_parallel_reads(mut self, num_parallel_reads: usize) -> Self {
        self.num_parallel_reads = num_parallel_reads;
        self
    }

    /// Set the last-example policy.
    pub fn with_last_example_handling(mut self, handling: LastExampleHandling) -> Self {
        self.last_example_handling = handling;
        self
    }

    /// Set the bad-example policy.
    pub fn with_bad_example_handling(mut self, handling: BadExampleHandling) -> Self {
        self.bad_example_handling = handling;
        self
    }

    /// Set whether discarded bad instances are warned about.
    pub fn with_warn_bad_instances(mut self, warn_bad_instances: bool) -> Self {
        self.warn_bad_instances = warn_bad_instances;
        self
    }

    /// Set the prefix skip.
    pub fn with_num_instances_to_skip(mut self, num_instances_to_skip: u64) -> Self {
        self.num_instances_to_skip = num_instances_to_skip;
        self
    }

    /// Set the post-skip read limit.
    pub fn with_num_instances_to_read(mut self, num_instances_to_read: u64) -> Self {
        self.num_instances_to_read = Some(num_instances_to_read);
        self
    }

    /// Select one shard of the dataset.
    pub fn with_shard(mut self, shard_index: u64, num_shards: u64) -> Self {
        self.shard_index = shard_index;
        self.num_shards = num_shards;
        self
    }

    /// Set the subsampling ratio.
    pub fn with_sample_ratio(mut self, sample_ratio: f32) -> Self {
        self.sample_ratio = Some(sample_ratio);
        self
    }

    /// Enable shuffling with the given reservoir size.
    pub fn with_shuffle_window(mut self, shuffle_window: usize) -> Self {
        self.shuffle_instances = true;
        self.shuffle_window = shuffle_window;
        self
    }

    /// Set the shuffle seed.
    pub fn with_shuffle_seed(mut self, shuffle_seed: u64) -> Self {
        self.shuffle_seed = Some(shuffle_seed);
        self
    }

    /// Set whether every epoch is reshuffled.
    pub fn with_reshuffle_each_epoch(mut self, reshuffle_each_epoch: bool) -> Self {
        self.reshuffle_each_epoch = reshuffle_each_epoch;
        self
    }

    /// Validate the option combination; called by reader constructors.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DataReaderError::invalid_argument(
                "the batch size must be at least one",
            ));
        }

        Ok(())
    }

    /// The effective prefetch depth.
    pub(crate) fn effective_num_prefetched_examples(&self) -> usize {
        if self.num_prefetched_examples == 0 {
            // Defaults to the number of processor cores.
            num_cpus::get()
        } else {
            self.num_prefetched_examples
        }
    }

    /// The effective decoder concurrency, bounded by the prefetch depth.
    pub(crate) fn effective_num_parallel_reads(&self) -> usize {
        let num_prefetched_examples = self.effective_num_prefetched_examples();

        if self.num_parallel_reads == 0 || self.num_parallel_reads > num_prefetched_examples {
            num_prefetched_examples
        } else {
            self.num_parallel_reads
        }
    }
}
