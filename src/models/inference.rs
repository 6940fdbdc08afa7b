//! Single-record inference over a loaded model

use crate::error::{PipelineError, Result};
use crate::models::decoder::{decode_class, OutputSelector};
use crate::models::loader::LoadedModel;
#[cfg(feature = "onnx")]
use crate::models::loader::ModelLoader;
use crate::models::runtime::OutputTensor;
use crate::types::InputEnvelope;
use std::sync::Arc;
use std::time::{Duration, Instant};
#[cfg(feature = "onnx")]
use std::path::Path;
use tracing::{debug, warn};

/// Shared handle to a loaded model that runs predictions.
///
/// Cloning is cheap; all clones share one `LoadedModel`.
#[derive(Debug, Clone)]
pub struct InferenceSession {
    model: Arc<LoadedModel>,
}

impl InferenceSession {
    pub fn new(model: LoadedModel) -> Self {
        Self {
            model: Arc::new(model),
        }
    }

    /// Load the artifact at `path` with the given loader settings.
    #[cfg(feature = "onnx")]
    pub fn load<P: AsRef<Path>>(path: P, loader: &ModelLoader) -> Result<Self> {
        Ok(Self::new(loader.load(path)?))
    }

    pub fn model(&self) -> &LoadedModel {
        &self.model
    }

    /// Run one forward pass and decode the selected output into a class index.
    pub fn predict(&self, envelope: &InputEnvelope, selector: &OutputSelector) -> Result<usize> {
        let start = Instant::now();
        let tensor = self.predict_tensor(envelope, selector)?;
        let class = decode_class(&tensor)?;

        debug!(
            model = %self.model.name,
            output = %selector,
            class = class,
            latency_us = start.elapsed().as_micros() as u64,
            "Prediction complete"
        );

        Ok(class)
    }

    /// Run one forward pass and return the selected output undecoded.
    pub fn predict_tensor(
        &self,
        envelope: &InputEnvelope,
        selector: &OutputSelector,
    ) -> Result<OutputTensor> {
        let outputs = self.model.output_names();
        let index = selector.resolve(&outputs)?;

        self.check_envelope(envelope)?;

        let mut produced = self.model.runtime().run(envelope)?;
        if produced.len() != outputs.len() {
            return Err(PipelineError::Inference(format!(
                "graph returned {} outputs, declared {}",
                produced.len(),
                outputs.len()
            )));
        }
        Ok(produced.swap_remove(index))
    }

    /// Predict with a deadline.
    ///
    /// The forward pass runs on the blocking pool. On expiry the call returns
    /// `Timeout`; the abandoned pass finishes in the background and releases
    /// its session.
    pub async fn predict_with_timeout(
        &self,
        envelope: InputEnvelope,
        selector: OutputSelector,
        timeout: Duration,
    ) -> Result<usize> {
        let session = self.clone();
        let task = tokio::task::spawn_blocking(move || session.predict(&envelope, &selector));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(PipelineError::Inference(format!(
                "prediction task failed: {}",
                e
            ))),
            Err(_) => {
                let ms = timeout.as_millis() as u64;
                warn!(model = %self.model.name, timeout_ms = ms, "Prediction timed out");
                Err(PipelineError::Timeout(ms))
            }
        }
    }

    /// Predict each envelope independently.
    pub fn predict_batch(
        &self,
        envelopes: &[InputEnvelope],
        selector: &OutputSelector,
    ) -> Vec<Result<usize>> {
        envelopes.iter().map(|e| self.predict(e, selector)).collect()
    }

    /// Every declared input must be present with a consistent shape and,
    /// when the signature declares one, the same feature layout.
    fn check_envelope(&self, envelope: &InputEnvelope) -> Result<()> {
        for input in &self.model.signature().inputs {
            let tensor = envelope.get(&input.name).ok_or_else(|| {
                PipelineError::Inference(format!(
                    "envelope has no tensor for input '{}' (has {:?})",
                    input.name,
                    envelope.tensor_names().collect::<Vec<_>>()
                ))
            })?;

            let expected = if tensor.shape.iter().any(|&d| d < 0) {
                None
            } else {
                tensor
                    .shape
                    .iter()
                    .try_fold(1i64, |acc, &d| acc.checked_mul(d))
                    .and_then(|n| usize::try_from(n).ok())
            };
            if expected != Some(tensor.values.len()) {
                return Err(PipelineError::Inference(format!(
                    "input '{}' has shape {:?} but {} values",
                    input.name,
                    tensor.shape,
                    tensor.values.len()
                )));
            }
            if tensor.batch_size() != 1 {
                return Err(PipelineError::Inference(format!(
                    "input '{}' holds {} rows, expected a single record",
                    input.name,
                    tensor.batch_size()
                )));
            }

            if input.feature_names.is_empty() {
                continue;
            }
            if tensor.feature_names != input.feature_names {
                let position = tensor
                    .feature_names
                    .iter()
                    .zip(&input.feature_names)
                    .position(|(a, b)| a != b);
                let reason = match position {
                    Some(i) => format!(
                        "position {} holds '{}', model expects '{}'",
                        i, tensor.feature_names[i], input.feature_names[i]
                    ),
                    None => format!(
                        "{} features, model expects {}",
                        tensor.feature_names.len(),
                        input.feature_names.len()
                    ),
                };
                return Err(PipelineError::LayoutMismatch {
                    input: input.name.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }
}
