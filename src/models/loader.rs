//! Model artifact discovery and loading

use crate::error::{PipelineError, Result};
use crate::models::runtime::GraphRuntime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Serialized computation graph inside an artifact directory
pub const GRAPH_FILE: &str = "model.onnx";
/// Directory of external weight shards
pub const VARIABLES_DIR: &str = "variables";
pub const SIGNATURE_FILE: &str = "signature.json";
pub const SIGNATURE_FORMAT_VERSION: u32 = 1;

/// One declared graph input and the feature layout it expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSignature {
    pub name: String,
    /// Feature names in tensor order; empty when the layout is not declared
    #[serde(default)]
    pub feature_names: Vec<String>,
}

/// Input/output contract of a model artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSignature {
    pub format_version: u32,
    pub inputs: Vec<InputSignature>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl ModelSignature {
    pub fn parse(json: &str) -> Result<Self> {
        let signature: ModelSignature = serde_json::from_str(json)
            .map_err(|e| PipelineError::ModelLoad(format!("invalid signature: {}", e)))?;
        if signature.format_version != SIGNATURE_FORMAT_VERSION {
            return Err(PipelineError::ModelLoad(format!(
                "unsupported signature format_version {} (expected {})",
                signature.format_version, SIGNATURE_FORMAT_VERSION
            )));
        }
        if signature.inputs.is_empty() {
            return Err(PipelineError::ModelLoad(
                "signature declares no inputs".to_string(),
            ));
        }
        Ok(signature)
    }

    /// Signature carrying only tensor names, as reported by a runtime.
    pub fn from_runtime(runtime: &dyn GraphRuntime) -> Self {
        Self {
            format_version: SIGNATURE_FORMAT_VERSION,
            inputs: runtime
                .input_names()
                .into_iter()
                .map(|name| InputSignature {
                    name,
                    feature_names: Vec::new(),
                })
                .collect(),
            outputs: runtime.output_names(),
        }
    }

    pub fn input(&self, name: &str) -> Option<&InputSignature> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Check the declared contract against what the runtime actually exposes.
    fn check_against(&self, runtime: &dyn GraphRuntime) -> Result<()> {
        let runtime_inputs = runtime.input_names();
        for input in &self.inputs {
            if !runtime_inputs.contains(&input.name) {
                return Err(PipelineError::ModelLoad(format!(
                    "signature input '{}' is not a graph input (graph has {:?})",
                    input.name, runtime_inputs
                )));
            }
        }
        if let Some(missing) = runtime_inputs.iter().find(|n| self.input(n).is_none()) {
            return Err(PipelineError::ModelLoad(format!(
                "graph input '{}' is missing from the signature",
                missing
            )));
        }
        let runtime_outputs = runtime.output_names();
        if !self.outputs.is_empty() && self.outputs != runtime_outputs {
            return Err(PipelineError::ModelLoad(format!(
                "signature outputs {:?} do not match graph outputs {:?}",
                self.outputs, runtime_outputs
            )));
        }
        Ok(())
    }
}

/// Files making up a model artifact directory.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub root: PathBuf,
    pub graph: PathBuf,
    /// External weight shards, sorted by file name
    pub variables: Vec<PathBuf>,
    pub signature: Option<ModelSignature>,
}

impl ModelArtifact {
    /// Locate and validate the artifact files under `dir`.
    pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(PipelineError::ModelLoad(format!(
                "artifact directory {} not found",
                root.display()
            )));
        }

        let graph = root.join(GRAPH_FILE);
        let graph_len = fs::metadata(&graph)
            .map_err(|e| {
                PipelineError::ModelLoad(format!("cannot read {}: {}", graph.display(), e))
            })?
            .len();
        if graph_len == 0 {
            return Err(PipelineError::ModelLoad(format!(
                "{} is empty",
                graph.display()
            )));
        }

        let variables = Self::discover_variables(&root.join(VARIABLES_DIR))?;

        let signature_path = root.join(SIGNATURE_FILE);
        let signature = if signature_path.exists() {
            let json = fs::read_to_string(&signature_path).map_err(|e| {
                PipelineError::ModelLoad(format!(
                    "cannot read {}: {}",
                    signature_path.display(),
                    e
                ))
            })?;
            Some(ModelSignature::parse(&json)?)
        } else {
            warn!(
                path = %root.display(),
                "No signature file, feature layout will not be checked"
            );
            None
        };

        Ok(Self {
            root,
            graph,
            variables,
            signature,
        })
    }

    fn discover_variables(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let read_err =
            |e: std::io::Error| PipelineError::ModelLoad(format!("cannot read {}: {}", dir.display(), e));

        let mut shards = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let metadata = entry.metadata().map_err(read_err)?;
            if !metadata.is_file() {
                continue;
            }
            if metadata.len() == 0 {
                return Err(PipelineError::ModelLoad(format!(
                    "weight shard {} is empty",
                    entry.path().display()
                )));
            }
            shards.push(entry.path());
        }
        shards.sort();
        Ok(shards)
    }

    /// Directory name, used as the model name in logs
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }
}

/// An opened model: graph runtime plus the contract it is served under.
///
/// Immutable after load and shared across callers; native resources are
/// released when the last handle drops.
pub struct LoadedModel {
    pub name: String,
    runtime: Box<dyn GraphRuntime>,
    signature: ModelSignature,
}

impl LoadedModel {
    /// Wrap a runtime, checking an explicit signature against it.
    pub fn from_runtime(
        name: impl Into<String>,
        runtime: Box<dyn GraphRuntime>,
        signature: Option<ModelSignature>,
    ) -> Result<Self> {
        let signature = match signature {
            Some(signature) => {
                signature.check_against(runtime.as_ref())?;
                signature
            }
            None => ModelSignature::from_runtime(runtime.as_ref()),
        };
        if runtime.output_names().is_empty() {
            return Err(PipelineError::ModelLoad("graph has no outputs".to_string()));
        }
        Ok(Self {
            name: name.into(),
            runtime,
            signature,
        })
    }

    pub fn runtime(&self) -> &dyn GraphRuntime {
        self.runtime.as_ref()
    }

    pub fn signature(&self) -> &ModelSignature {
        &self.signature
    }

    /// Output names in declared order
    pub fn output_names(&self) -> Vec<String> {
        self.runtime.output_names()
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Loader for model artifacts
#[derive(Debug, Clone)]
pub struct ModelLoader {
    /// Independent sessions kept per model
    sessions: usize,
    /// Number of threads per session
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new(sessions: usize, onnx_threads: usize) -> Self {
        Self {
            sessions: sessions.max(1),
            onnx_threads: onnx_threads.max(1),
        }
    }

    pub fn sessions(&self) -> usize {
        self.sessions
    }

    pub fn onnx_threads(&self) -> usize {
        self.onnx_threads
    }

    /// Load the artifact at `dir` into an ONNX Runtime session pool.
    #[cfg(feature = "onnx")]
    pub fn load<P: AsRef<Path>>(&self, dir: P) -> Result<LoadedModel> {
        let artifact = ModelArtifact::discover(dir)?;
        let name = artifact.name();

        tracing::info!(
            model = %name,
            path = %artifact.graph.display(),
            shards = artifact.variables.len(),
            sessions = self.sessions,
            threads = self.onnx_threads,
            "Loading model"
        );

        let runtime =
            crate::models::onnx::OnnxRuntime::load(&artifact.graph, self.sessions, self.onnx_threads)?;
        let model = LoadedModel::from_runtime(name, Box::new(runtime), artifact.signature)?;

        tracing::info!(
            model = %model.name,
            inputs = ?model.signature.inputs.iter().map(|i| &i.name).collect::<Vec<_>>(),
            outputs = ?model.output_names(),
            "Model loaded successfully"
        );

        Ok(model)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new(1, 1)
    }
}
