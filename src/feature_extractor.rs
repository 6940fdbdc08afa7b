//! Feature extraction: records to model input envelopes.
//!
//! Specs are applied in the order given. That order is the layout of the
//! feature vector the model was trained on, so it is never sorted, grouped or
//! deduplicated here.

use crate::error::{PipelineError, Result};
use crate::transformers::{PreparedTransformer, Specification, TransformerRegistry, TransformerSpec};
use crate::types::{FeatureVector, Field, InputEnvelope, InputTensor, RawRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Default dense input tensor name
pub const DEFAULT_INPUT: &str = "features";

/// How a feature vector is packed into named tensors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeLayout {
    /// The whole vector as one `[1, n]` tensor under `input`
    Dense { input: String },
    /// One `[1, 1]` tensor per feature, keyed by feature name
    PerFeature,
}

impl EnvelopeLayout {
    pub fn dense(input: impl Into<String>) -> Self {
        EnvelopeLayout::Dense {
            input: input.into(),
        }
    }

    /// Wrap a vector without touching its values.
    pub fn pack(&self, vector: FeatureVector) -> InputEnvelope {
        let mut envelope = InputEnvelope::new();
        let (names, values) = vector.into_parts();
        match self {
            EnvelopeLayout::Dense { input } => {
                envelope.insert(input.clone(), InputTensor::row(names, values));
            }
            EnvelopeLayout::PerFeature => {
                for (name, value) in names.into_iter().zip(values) {
                    envelope.insert(name.clone(), InputTensor::row(vec![name], vec![value]));
                }
            }
        }
        envelope
    }
}

impl Default for EnvelopeLayout {
    fn default() -> Self {
        Self::dense(DEFAULT_INPUT)
    }
}

/// Applies transformer specs to records.
#[derive(Debug, Clone)]
pub struct FeatureVectorBuilder {
    registry: Arc<TransformerRegistry>,
}

impl FeatureVectorBuilder {
    pub fn new(registry: Arc<TransformerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TransformerRegistry {
        &self.registry
    }

    /// Resolve every spec against the registry once.
    pub fn compile(&self, spec: &Specification) -> Result<FeaturePlan> {
        let steps = spec
            .specs()
            .iter()
            .map(|s| Ok((s.clone(), self.registry.prepare(s)?)))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            transformers = steps.len(),
            width = spec.width(),
            "Compiled feature plan"
        );

        Ok(FeaturePlan {
            steps,
            width: spec.width(),
        })
    }

    /// One-shot build of the feature vector for a record.
    pub fn build(&self, record: &RawRecord, spec: &Specification) -> Result<FeatureVector> {
        self.compile(spec)?.build(record)
    }

    /// Build and pack in one step.
    pub fn build_envelope(
        &self,
        record: &RawRecord,
        spec: &Specification,
        layout: &EnvelopeLayout,
    ) -> Result<InputEnvelope> {
        Ok(layout.pack(self.build(record, spec)?))
    }
}

impl Default for FeatureVectorBuilder {
    fn default() -> Self {
        Self::new(Arc::new(TransformerRegistry::new()))
    }
}

/// A specification bound to prepared transformers, reusable across records.
#[derive(Debug)]
pub struct FeaturePlan {
    steps: Vec<(TransformerSpec, Box<dyn PreparedTransformer>)>,
    width: usize,
}

impl FeaturePlan {
    /// Feature vector length
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .flat_map(|(s, _)| s.feature_names.iter().map(String::as_str))
    }

    pub fn build(&self, record: &RawRecord) -> Result<FeatureVector> {
        let mut vector = FeatureVector::with_capacity(self.width);

        for (spec, transformer) in &self.steps {
            let inputs = spec
                .input_fields()
                .iter()
                .map(|name| {
                    record
                        .get(name)
                        .ok_or_else(|| PipelineError::FieldNotFound(name.clone()))
                })
                .collect::<Result<Vec<&Field>>>()?;

            let values = transformer.transform(&inputs)?;
            if values.len() != spec.width() {
                return Err(PipelineError::FeatureArity {
                    transformer: spec.name.clone(),
                    declared: spec.width(),
                    actual: values.len(),
                });
            }
            vector.extend_segment(&spec.feature_names, values);
        }

        Ok(vector)
    }

    pub fn build_envelope(&self, record: &RawRecord, layout: &EnvelopeLayout) -> Result<InputEnvelope> {
        Ok(layout.pack(self.build(record)?))
    }
}
