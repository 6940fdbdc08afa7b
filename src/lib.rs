//! Model Serving Library
//!
//! Reproduces training-time feature engineering from a declarative transformer
//! spec and scores the resulting vectors with an ONNX model.

pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod transformers;
pub mod types;

pub use config::AppConfig;
pub use error::{ErrorKind, PipelineError, Result};
pub use feature_extractor::{EnvelopeLayout, FeaturePlan, FeatureVectorBuilder};
pub use models::{InferenceSession, LoadedModel, ModelLoader, OutputSelector};
pub use pipeline::ModelPipeline;
pub use transformers::{Specification, TransformerRegistry, TransformerSpec};
pub use types::{Field, InputEnvelope, RawRecord};
