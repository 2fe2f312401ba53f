// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Grouping instances into indexed batches.

use std::sync::Arc;

use tracing::warn;

use crate::error::Result;
use crate::instances::{Instance, InstanceBatch, InstanceReader};
use crate::reader::{LastExampleHandling, ReaderOptions};

/// Pulls instances off the reader chain and groups them into batches of
/// the configured size, honoring the last-example policy on the short
/// tail of an epoch.
pub(crate) struct InstanceBatchReader {
    options: Arc<ReaderOptions>,
    reader: Box<dyn InstanceReader>,
    batch_index: u64,
}

impl InstanceBatchReader {
    pub(crate) fn new(options: Arc<ReaderOptions>, reader: Box<dyn InstanceReader>) -> Self {
        InstanceBatchReader {
            options,
            reader,
            batch_index: 0,
        }
    }

    /// The underlying reader chain, for schema inference peeks.
    pub(crate) fn reader_mut(&mut self) -> &mut dyn InstanceReader {
        self.reader.as_mut()
    }

    pub(crate) fn read_batch(&mut self) -> Result<Option<InstanceBatch>> {
        let batch_size = self.options.batch_size;

        let mut instances = Vec::with_capacity(batch_size);
        while instances.len() < batch_size {
            let Some(instance) = self.reader.read_instance()? else {
                break;
            };

            instances.push(instance);
        }

        if instances.is_empty() {
            return Ok(None);
        }

        let mut padding = 0u64;

        if instances.len() < batch_size {
            match self.options.last_example_handling {
                LastExampleHandling::None => {}
                LastExampleHandling::Drop => return Ok(None),
                LastExampleHandling::DropWarn => {
                    warn!(
                        num_instances = instances.len(),
                        batch_size, "dropping the last example of the epoch"
                    );

                    return Ok(None);
                }
                LastExampleHandling::Pad | LastExampleHandling::PadWarn => {
                    padding = (batch_size - instances.len()) as u64;

                    if self.options.last_example_handling == LastExampleHandling::PadWarn {
                        warn!(
                            num_instances = instances.len(),
                            batch_size, padding, "padding the last example of the epoch"
                        );
                    }

                    instances.resize_with(batch_size, Instance::padding);
                }
            }
        }

        let size_bytes: u64 = instances
            .iter()
            .map(|instance| instance.bits().len() as u64)
            .sum();

        let batch = InstanceBatch::new(instances, self.batch_index, size_bytes, padding);
        self.batch_index += 1;

        Ok(Some(batch))
    }

    pub(crate) fn reset(&mut self) {
        self.reader.reset();

        self.batch_index = 0;
    }
}
