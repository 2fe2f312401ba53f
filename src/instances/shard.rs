// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Deterministic modular sharding of the instance stream.

use crate::error::{DataReaderError, Result};
use crate::instances::{Instance, InstanceReader, InstanceReaderBase, InstanceReaderCore};

/// Keeps every `num_shards`-th instance starting at `shard_index`.
///
/// Shards with the same inner stream are pairwise disjoint, and the union
/// over all shard indices reproduces the unsharded stream.
pub(crate) struct ShardedInstanceReader {
    base: InstanceReaderBase,
    inner: Box<dyn InstanceReader>,
    shard_index: u64,
    num_shards: u64,
    first_read: bool,
}

impl ShardedInstanceReader {
    pub(crate) fn new(
        shard_index: u64,
        num_shards: u64,
        inner: Box<dyn InstanceReader>,
    ) -> Result<Self> {
        if num_shards == 0 {
            return Err(DataReaderError::invalid_argument(
                "the number of shards must be at least one",
            ));
        }

        if shard_index >= num_shards {
            return Err(DataReaderError::invalid_argument(
                "the shard index must be less than the number of shards",
            ));
        }

        Ok(ShardedInstanceReader {
            base: InstanceReaderBase::default(),
            inner,
            shard_index,
            num_shards,
            first_read: true,
        })
    }
}

impl InstanceReaderCore for ShardedInstanceReader {
    fn read_instance_core(&mut self) -> Result<Option<Instance>> {
        let num_instances_to_skip = if self.first_read {
            self.first_read = false;

            self.shard_index
        } else {
            self.num_shards - 1
        };

        for _ in 0..num_instances_to_skip {
            if self.inner.read_instance()?.is_none() {
                return Ok(None);
            }
        }

        self.inner.read_instance()
    }

    fn reset_core(&mut self) {
        self.inner.reset();

        self.first_read = true;
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
    use crate::instances::testing::{drain, VecInstanceReader};

    fn shard(count: usize, index: u64, shards: u64) -> Vec<Vec<u8>> {
        let inner = Box::new(VecInstanceReader::counting(count));
        let mut reader = ShardedInstanceReader::new(index, shards, inner).unwrap();

        drain(&mut reader)
    }

    #[test]
    fn test_shards_partition_the_stream() {
        assert_eq!(shard(10, 0, 3), vec![vec![0], vec![3], vec![6], vec![9]]);
        assert_eq!(shard(10, 1, 3), vec![vec![1], vec![4], vec![7]]);
        assert_eq!(shard(10, 2, 3), vec![vec![2], vec![5], vec![8]]);
    }

    #[test]
    fn test_single_shard_passes_everything() {
        assert_eq!(shard(3, 0, 1).len(), 3);
    }

    #[test]
    fn test_invalid_shard_parameters() {
        let inner = Box::new(VecInstanceReader::counting(1));
        assert!(ShardedInstanceReader::new(3, 3, inner).is_err());

        let inner = Box::new(VecInstanceReader::counting(1));
        assert!(ShardedInstanceReader::new(0, 0, inner).is_err());
    }

    #[test]
    fn test_reset_restores_the_shard_offset() {
        let inner = Box::new(VecInstanceReader::counting(6));
        let mut reader = ShardedInstanceReader::new(1, 2, inner).unwrap();

        assert_eq!(drain(&mut reader), vec![vec![1], vec![3], vec![5]]);

        reader.reset();
        assert_eq!(drain(&mut reader), vec![vec![1], vec![3], vec![5]]);
    }
}
