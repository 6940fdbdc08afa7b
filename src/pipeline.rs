//! Record-to-class-index orchestration

use crate::error::Result;
use crate::feature_extractor::{EnvelopeLayout, FeaturePlan, FeatureVectorBuilder};
use crate::models::{InferenceSession, OutputSelector};
#[cfg(feature = "onnx")]
use crate::models::ModelLoader;
use crate::transformers::{Specification, TransformerRegistry};
use crate::types::{InputEnvelope, RawRecord};
#[cfg(feature = "onnx")]
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Feature extraction and inference over one loaded model.
///
/// `extract_features` and `predict` are independent calls; the only state
/// they share is the immutable model handle.
#[derive(Debug, Clone)]
pub struct ModelPipeline {
    builder: FeatureVectorBuilder,
    session: InferenceSession,
    layout: EnvelopeLayout,
}

impl ModelPipeline {
    /// Envelopes are packed to match the model's declared inputs: a single
    /// input receives the dense vector, several inputs one tensor per feature.
    pub fn new(session: InferenceSession, registry: Arc<TransformerRegistry>) -> Self {
        let inputs = &session.model().signature().inputs;
        let layout = match inputs.as_slice() {
            [single] => EnvelopeLayout::dense(single.name.clone()),
            _ => EnvelopeLayout::PerFeature,
        };

        info!(model = %session.model().name, layout = ?layout, "Pipeline ready");

        Self {
            builder: FeatureVectorBuilder::new(registry),
            session,
            layout,
        }
    }

    /// Load the artifact at `model_dir` with the built-in transformer kinds.
    #[cfg(feature = "onnx")]
    pub fn load<P: AsRef<Path>>(model_dir: P, loader: &ModelLoader) -> Result<Self> {
        let session = InferenceSession::load(model_dir, loader)?;
        Ok(Self::new(session, Arc::new(TransformerRegistry::new())))
    }

    pub fn with_layout(mut self, layout: EnvelopeLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn layout(&self) -> &EnvelopeLayout {
        &self.layout
    }

    pub fn session(&self) -> &InferenceSession {
        &self.session
    }

    /// Parse and prepare a spec once for repeated extraction.
    pub fn compile(&self, spec_json: &str) -> Result<FeaturePlan> {
        self.builder.compile(&Specification::parse(spec_json)?)
    }

    /// Build the model input envelope for one record.
    pub fn extract_features(&self, record: &RawRecord, spec_json: &str) -> Result<InputEnvelope> {
        self.extract_with_plan(record, &self.compile(spec_json)?)
    }

    pub fn extract_with_plan(&self, record: &RawRecord, plan: &FeaturePlan) -> Result<InputEnvelope> {
        plan.build_envelope(record, &self.layout)
    }

    pub fn predict(&self, envelope: &InputEnvelope, selector: &OutputSelector) -> Result<usize> {
        self.session.predict(envelope, selector)
    }

    pub async fn predict_with_timeout(
        &self,
        envelope: InputEnvelope,
        selector: OutputSelector,
        timeout: Duration,
    ) -> Result<usize> {
        self.session
            .predict_with_timeout(envelope, selector, timeout)
            .await
    }
}
