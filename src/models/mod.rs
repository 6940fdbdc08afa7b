//! Model loading, graph execution and output decoding

pub mod decoder;
pub mod inference;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod runtime;

pub use decoder::OutputSelector;
pub use inference::InferenceSession;
pub use loader::{LoadedModel, ModelArtifact, ModelLoader, ModelSignature};
#[cfg(feature = "onnx")]
pub use onnx::OnnxRuntime;
pub use runtime::{GraphRuntime, OutputData, OutputTensor};
