// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Windowed reservoir shuffle of the instance stream.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::instances::{Instance, InstanceReader, InstanceReaderBase, InstanceReaderCore};

/// Shuffles instances through a reservoir of up to `window` entries.
///
/// Each read tops the reservoir up from the inner reader, then returns a
/// uniformly chosen entry (swap-and-pop with the last one). Once the
/// inner reader is exhausted the remaining reservoir is shuffled once and
/// drained in that order.
///
/// A window of one passes instances through unchanged. A window of zero
/// widens the reservoir to the whole epoch, i.e. a perfect shuffle that
/// materializes the epoch in memory.
pub(crate) struct ShuffledInstanceReader {
    base: InstanceReaderBase,
    inner: Box<dyn InstanceReader>,
    window: usize,
    seed: u64,
    rng: SmallRng,
    reshuffle_each_epoch: bool,
    buffer: Vec<Instance>,
    inner_has_instance: bool,
}

impl ShuffledInstanceReader {
    pub(crate) fn new(
        window: usize,
        seed: Option<u64>,
        reshuffle_each_epoch: bool,
        inner: Box<dyn InstanceReader>,
    ) -> Self {
        let window = if window == 0 { usize::MAX } else { window };

        // Capture the seed once so a reset can restore the generator.
        let seed = seed.unwrap_or_else(rand::random);

        ShuffledInstanceReader {
            base: InstanceReaderBase::default(),
            inner,
            window,
            seed,
            rng: SmallRng::seed_from_u64(seed),
            reshuffle_each_epoch,
            buffer: Vec::new(),
            inner_has_instance: true,
        }
    }

    fn fill_buffer_from_inner(&mut self) -> Result<()> {
        while self.inner_has_instance && self.buffer.len() < self.window {
            let Some(instance) = self.inner.read_instance()? else {
                self.inner_has_instance = false;

                // Final drain: shuffle what is left once and pop it off
                // the back.
                self.buffer.shuffle(&mut self.rng);

                break;
            };

            self.buffer.push(instance);
        }

        Ok(())
    }

    fn pop_random_instance_from_buffer(&mut self) -> Instance {
        let random_index = self.rng.random_range(0..self.buffer.len());

        self.buffer.swap_remove(random_index)
    }
}

impl InstanceReaderCore for ShuffledInstanceReader {
    fn read_instance_core(&mut self) -> Result<Option<Instance>> {
        if self.window == 1 {
            return self.inner.read_instance();
        }

        self.fill_buffer_from_inner()?;

        if self.buffer.is_empty() {
            return Ok(None);
        }

        if self.inner_has_instance {
            return Ok(Some(self.pop_random_instance_from_buffer()));
        }

        Ok(self.buffer.pop())
    }

    fn reset_core(&mut self) {
        self.inner.reset();

        self.buffer.clear();
        self.inner_has_instance = true;

        // Restore the generator to its initial state so every epoch
        // replays the same order unless reshuffling was requested.
        if !self.reshuffle_each_epoch {
            self.rng = SmallRng::seed_from_u64(self.seed);
        }
    }

    fn base(&self) -> &InstanceReaderBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut InstanceReaderBase {
        &mut self.base
    }
}
