// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Skip-N / take-N over an inner instance reader.

use crate::error::Result;
use crate::instances::{Instance, InstanceReader, InstanceReaderBase, InstanceReaderCore};

/// Skips a prefix of the inner stream and bounds how many instances are
/// emitted afterwards. The skip is replayed on every reset.
pub(crate) struct RangedInstanceReader {
    base: InstanceReaderBase,
    inner: Box<dyn InstanceReader>,
    num_instances_to_skip: u64,
    num_instances_to_read: Option<u64>,
    first_read: bool,
    num_instances_read: u64,
}

impl RangedInstanceReader {
    pub(crate) fn new(
        num_instances_to_skip: u64,
        num_instances_to_read: Option<u64>,
        inner: Box<dyn InstanceReader>,
    ) -> Self {
        RangedInstanceReader {
            base: InstanceReaderBase::default(),
            inner,
            num_instances_to_skip,
            num_instances_to_read,
            first_read: true,
            num_instances_read: 0,
        }
    }

    fn should_stop_reading(&self) -> bool {
        match self.num_instances_to_read {
            Some(limit) => self.num_instances_read == limit,
            None => false,
        }
    }
}

impl InstanceReaderCore for RangedInstanceReader {
    fn read_instance_core(&mut self) -> Result<Option<Instance>> {
        if self.first_read {
            self.first_read = false;

            for _ in 0..self.num_instances_to_skip {
                if self.inner.read_instance()?.is_none() {
                    return Ok(None);
                }
            }
        }

        if self.should_stop_reading() {
            return Ok(None);
        }

        let Some(instance) = self.inner.read_instance()? else {
            return Ok(None);
        };

        self.num_instances_read += 1;

        Ok(Some(instance))
    }

    fn reset_core(&mut self) {
        self.inner.reset();

        self.first_read = true;
        self.num_instances_read = 0;
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

    #[test]
    fn test_skip_and_take() {
        let inner = Box::new(VecInstanceReader::counting(10));
        let mut reader = RangedInstanceReader::new(2, Some(3), inner);

        assert_eq!(drain(&mut reader), vec![vec![2], vec![3], vec![4]]);
    }

    #[test]
    fn test_skip_only() {
        let inner = Box::new(VecInstanceReader::counting(4));
        let mut reader = RangedInstanceReader::new(3, None, inner);

        assert_eq!(drain(&mut reader), vec![vec![3]]);
    }

    #[test]
    fn test_skip_past_the_end_is_empty() {
        let inner = Box::new(VecInstanceReader::counting(2));
        let mut reader = RangedInstanceReader::new(5, None, inner);

        assert!(drain(&mut reader).is_empty());
    }

    #[test]
    fn test_reset_replays_the_skip() {
        let inner = Box::new(VecInstanceReader::counting(6));
        let mut reader = RangedInstanceReader::new(1, Some(2), inner);

        assert_eq!(drain(&mut reader), vec![vec![1], vec![2]]);

        reader.reset();
        assert_eq!(drain(&mut reader), vec![vec![1], vec![2]]);
    }
}
