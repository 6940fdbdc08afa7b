//! ONNX Runtime backend

use crate::error::{PipelineError, Result};
use crate::models::runtime::{GraphRuntime, OutputData, OutputTensor};
use crate::types::InputEnvelope;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DynValue, Tensor};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// A pool of independent sessions over one graph.
///
/// A forward pass needs exclusive access to its session, so each call takes
/// the first free one and only waits when the whole pool is busy.
pub struct OnnxRuntime {
    sessions: Vec<Mutex<Session>>,
    next: AtomicUsize,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OnnxRuntime {
    pub fn load(graph: &Path, sessions: usize, onnx_threads: usize) -> Result<Self> {
        let mut pool = Vec::with_capacity(sessions.max(1));
        for _ in 0..sessions.max(1) {
            pool.push(Mutex::new(Self::open_session(graph, onnx_threads)?));
        }

        let (input_names, output_names) = {
            let first = pool[0]
                .lock()
                .map_err(|e| PipelineError::ModelLoad(format!("Lock error: {}", e)))?;
            (
                first.inputs.iter().map(|i| i.name.clone()).collect::<Vec<_>>(),
                first.outputs.iter().map(|o| o.name.clone()).collect::<Vec<_>>(),
            )
        };

        info!(
            path = %graph.display(),
            sessions = pool.len(),
            inputs = ?input_names,
            outputs = ?output_names,
            "ONNX session pool created"
        );

        Ok(Self {
            sessions: pool,
            next: AtomicUsize::new(0),
            input_names,
            output_names,
        })
    }

    fn open_session(graph: &Path, onnx_threads: usize) -> Result<Session> {
        let load_err = |e: &dyn std::fmt::Display| {
            PipelineError::ModelLoad(format!("Failed to load model from {:?}: {}", graph, e))
        };
        Session::builder()
            .map_err(|e| load_err(&e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_err(&e))?
            .with_intra_threads(onnx_threads)
            .map_err(|e| load_err(&e))?
            .commit_from_file(graph)
            .map_err(|e| load_err(&e))
    }

    fn acquire(&self) -> Result<MutexGuard<'_, Session>> {
        for session in &self.sessions {
            if let Ok(guard) = session.try_lock() {
                return Ok(guard);
            }
        }
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        debug!(slot = slot, "All sessions busy, waiting");
        self.sessions[slot]
            .lock()
            .map_err(|e| PipelineError::Inference(format!("Lock error: {}", e)))
    }
}

impl GraphRuntime for OnnxRuntime {
    fn input_names(&self) -> Vec<String> {
        self.input_names.clone()
    }

    fn output_names(&self) -> Vec<String> {
        self.output_names.clone()
    }

    fn run(&self, envelope: &InputEnvelope) -> Result<Vec<OutputTensor>> {
        let mut inputs: Vec<(String, DynValue)> = Vec::with_capacity(self.input_names.len());
        for name in &self.input_names {
            let tensor = envelope.get(name).ok_or_else(|| {
                PipelineError::Inference(format!("envelope has no tensor for input '{}'", name))
            })?;
            let value = Tensor::from_array((tensor.shape.clone(), tensor.values.clone()))?;
            inputs.push((name.clone(), value.into_dyn()));
        }

        let mut session = self.acquire()?;
        let outputs = session.run(inputs)?;

        self.output_names
            .iter()
            .map(|name| {
                let value = outputs.get(name.as_str()).ok_or_else(|| {
                    PipelineError::Inference(format!("graph produced no output '{}'", name))
                })?;
                extract(name, value)
            })
            .collect()
    }
}

fn extract(name: &str, value: &DynValue) -> Result<OutputTensor> {
    if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
        return Ok(OutputTensor {
            shape: shape.iter().copied().collect(),
            data: OutputData::F32(data.to_vec()),
        });
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<f64>() {
        return Ok(OutputTensor {
            shape: shape.iter().copied().collect(),
            data: OutputData::F64(data.to_vec()),
        });
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
        return Ok(OutputTensor {
            shape: shape.iter().copied().collect(),
            data: OutputData::I64(data.to_vec()),
        });
    }
    Err(PipelineError::Inference(format!(
        "output '{}' is not a float32, float64 or int64 tensor",
        name
    )))
}
