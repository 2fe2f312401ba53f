// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Proportional subsampling of the instance stream.

use std::collections::VecDeque;

use crate::error::{DataReaderError, Result};
use crate::instances::{Instance, InstanceReader, InstanceReaderBase, InstanceReaderCore};

/// Instances buffered per sampling block.
const BLOCK_SIZE: usize = 100;

/// Emits a deterministic proportional sample of the inner stream.
///
/// Fills a block of up to [`BLOCK_SIZE`] instances, keeps the first
/// `floor(ratio * block_len)` of them, drains the kept instances, and
/// refills.
pub(crate) struct SampledInstanceReader {
    base: InstanceReaderBase,
    inner: Box<dyn InstanceReader>,
    sample_ratio: f32,
    buffer: VecDeque<Instance>,
}

impl SampledInstanceReader {
    pub(crate) fn new(sample_ratio: f32, inner: Box<dyn InstanceReader>) -> Result<Self> {
        if sample_ratio <= 0.0 || sample_ratio >= 1.0 {
            return Err(DataReaderError::invalid_argument(
                "the sample ratio must be greater than 0 and less than 1",
            ));
        }

        Ok(SampledInstanceReader {
            base: InstanceReaderBase::default(),
            inner,
            sample_ratio,
            buffer: VecDeque::with_capacity(BLOCK_SIZE),
        })
    }

    fn fill_buffer_from_inner(&mut self) -> Result<()> {
        let mut block = Vec::with_capacity(BLOCK_SIZE);

        while block.len() < BLOCK_SIZE {
            let Some(instance) = self.inner.read_instance()? else {
                break;
            };

            block.push(instance);
        }

        let num_to_keep = (self.sample_ratio * block.len() as f32) as usize;
        block.truncate(num_to_keep);

        self.buffer = block.into();

        Ok(())
    }
}

impl InstanceReaderCore for SampledInstanceReader {
    fn read_instance_core(&mut self) -> Result<Option<Instance>> {
        if self.buffer.is_empty() {
            self.fill_buffer_from_inner()?;
        }

        Ok(self.buffer.pop_front())
    }

    fn reset_core(&mut self) {
        self.inner.reset();

        self.buffer.clear();
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
    fn test_keeps_the_head_of_each_block() {
        let inner = Box::new(VecInstanceReader::counting(100));
        let mut reader = SampledInstanceReader::new(0.25, inner).unwrap();

        let sampled = drain(&mut reader);
        assert_eq!(sampled.len(), 25);
        assert_eq!(sampled[0], vec![0]);
        assert_eq!(sampled[24], vec![24]);
    }

    #[test]
    fn test_short_final_block_is_sampled_proportionally() {
        // 150 instances: a full block keeps 75, the final block of 50
        // keeps floor(0.75 * 50) = 37.
        let inner = Box::new(VecInstanceReader::counting(150));
        let mut reader = SampledInstanceReader::new(0.75, inner).unwrap();

        assert_eq!(drain(&mut reader).len(), 75 + 37);
    }

    #[test]
    fn test_invalid_ratio_fails_at_construction() {
        for ratio in [0.0, 1.0, -0.5, 2.0] {
            let inner = Box::new(VecInstanceReader::counting(1));
            assert!(SampledInstanceReader::new(ratio, inner).is_err());
        }
    }

    #[test]
    fn test_reset_resamples_identically() {
        let inner = Box::new(VecInstanceReader::counting(40));
        let mut reader = SampledInstanceReader::new(0.5, inner).unwrap();

        let first = drain(&mut reader);
        reader.reset();
        let second = drain(&mut reader);

        assert_eq!(first, second);
    }
}
