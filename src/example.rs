// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Examples: the batched output unit of a reader.

use std::sync::Arc;

use crate::error::SchemaError;
use crate::schema::Schema;
use crate::tensor::Tensor;

/// One batched unit produced by a reader: a schema plus one feature
/// tensor per attribute, positionally matched.
#[derive(Debug, Clone)]
pub struct Example {
    schema: Arc<Schema>,
    features: Vec<Tensor>,
    padding: u64,
}

impl Example {
    /// Create an example; the features must conform to the schema
    /// positionally and in element type.
    pub fn new(schema: Arc<Schema>, features: Vec<Tensor>) -> Result<Self, SchemaError> {
        Example::with_padding(schema, features, 0)
    }

    /// Create an example whose last `padding` batch slots are zero
    /// padding rather than data.
    pub fn with_padding(
        schema: Arc<Schema>,
        features: Vec<Tensor>,
        padding: u64,
    ) -> Result<Self, SchemaError> {
        if features.len() != schema.len() {
            return Err(SchemaError::Nonconforming {
                message: format!(
                    "the schema has {} attribute(s) but {} feature(s) were decoded",
                    schema.len(),
                    features.len()
                ),
            });
        }

        for (attribute, feature) in schema.attributes().iter().zip(&features) {
            if attribute.data_type() != feature.data_type() {
                return Err(SchemaError::Nonconforming {
                    message: format!(
                        "the attribute '{}' has type {} but the decoded feature has type {}",
                        attribute.name(),
                        attribute.data_type(),
                        feature.data_type()
                    ),
                });
            }
        }

        Ok(Example {
            schema,
            features,
            padding,
        })
    }

    /// The schema of the example.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The feature tensors, in schema order.
    pub fn features(&self) -> &[Tensor] {
        &self.features
    }

    /// Look up a feature tensor by attribute name.
    pub fn feature(&self, name: &str) -> Option<&Tensor> {
        self.schema
            .attribute_index(name)
            .map(|position| &self.features[position])
    }

    /// How many trailing batch slots are padding; nonzero only when a
    /// short or partially bad batch was padded.
    pub fn padding(&self) -> u64 {
        self.padding
    }
}
