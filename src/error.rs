//! Error taxonomy for feature extraction and inference.

use std::fmt;
use thiserror::Error;

/// Errors surfaced by the scoring pipeline.
///
/// Every failure aborts the call that produced it; no variant is ever
/// coerced into a default feature value or a fabricated class index.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The transformer specification document is malformed
    #[error("Failed to parse transformer spec: {0}")]
    SpecParse(String),

    /// No transformer is registered under the requested kind
    #[error("Unsupported transformer kind: {0}")]
    UnsupportedTransformer(String),

    /// An aggregate string does not parse for its transformer kind
    #[error("Malformed aggregate for '{transformer}': {reason}")]
    MalformedAggregate { transformer: String, reason: String },

    /// The spec names a field the record schema does not declare
    #[error("Field not found in record: {0}")]
    FieldNotFound(String),

    /// The field exists but carries no value
    #[error("Missing value for field: {0}")]
    MissingField(String),

    /// A record value that cannot be read as its declared type
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A categorical value outside the trained vocabulary
    #[error("Unknown category '{value}' for '{transformer}'")]
    UnknownCategory { transformer: String, value: String },

    /// Aggregated statistics that make the transform undefined
    #[error("Degenerate aggregate for '{transformer}': {reason}")]
    DegenerateAggregate { transformer: String, reason: String },

    /// A transformer produced a different width than its declared feature names
    #[error("Transformer '{transformer}' produced {actual} values, spec declares {declared}")]
    FeatureArity {
        transformer: String,
        declared: usize,
        actual: usize,
    },

    /// The model artifact is missing, truncated or incompatible
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    /// Shape/name mismatch or runtime failure during a forward pass
    #[error("Inference failed: {0}")]
    Inference(String),

    /// The envelope feature layout disagrees with the model's declared layout
    #[error("Feature layout mismatch on input '{input}': {reason}")]
    LayoutMismatch { input: String, reason: String },

    /// The forward pass did not finish before the caller's deadline
    #[error("Prediction timed out after {0}ms")]
    Timeout(u64),
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Payload-free discriminant of [`PipelineError`], used for bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    SpecParse,
    UnsupportedTransformer,
    MalformedAggregate,
    FieldNotFound,
    MissingField,
    InvalidRecord,
    UnknownCategory,
    DegenerateAggregate,
    FeatureArity,
    ModelLoad,
    Inference,
    LayoutMismatch,
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SpecParse => "spec_parse",
            ErrorKind::UnsupportedTransformer => "unsupported_transformer",
            ErrorKind::MalformedAggregate => "malformed_aggregate",
            ErrorKind::FieldNotFound => "field_not_found",
            ErrorKind::MissingField => "missing_field",
            ErrorKind::InvalidRecord => "invalid_record",
            ErrorKind::UnknownCategory => "unknown_category",
            ErrorKind::DegenerateAggregate => "degenerate_aggregate",
            ErrorKind::FeatureArity => "feature_arity",
            ErrorKind::ModelLoad => "model_load",
            ErrorKind::Inference => "inference",
            ErrorKind::LayoutMismatch => "layout_mismatch",
            ErrorKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::SpecParse(_) => ErrorKind::SpecParse,
            PipelineError::UnsupportedTransformer(_) => ErrorKind::UnsupportedTransformer,
            PipelineError::MalformedAggregate { .. } => ErrorKind::MalformedAggregate,
            PipelineError::FieldNotFound(_) => ErrorKind::FieldNotFound,
            PipelineError::MissingField(_) => ErrorKind::MissingField,
            PipelineError::InvalidRecord(_) => ErrorKind::InvalidRecord,
            PipelineError::UnknownCategory { .. } => ErrorKind::UnknownCategory,
            PipelineError::DegenerateAggregate { .. } => ErrorKind::DegenerateAggregate,
            PipelineError::FeatureArity { .. } => ErrorKind::FeatureArity,
            PipelineError::ModelLoad(_) => ErrorKind::ModelLoad,
            PipelineError::Inference(_) => ErrorKind::Inference,
            PipelineError::LayoutMismatch { .. } => ErrorKind::LayoutMismatch,
            PipelineError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// True for infrastructure faults: model load and timeout.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::ModelLoad(_) | PipelineError::Timeout(_))
    }

    /// True for failures raised while feeding or running the model.
    pub fn is_inference_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::Inference(_)
                | PipelineError::LayoutMismatch { .. }
                | PipelineError::Timeout(_)
        )
    }

    pub(crate) fn malformed(transformer: &str, reason: impl Into<String>) -> Self {
        PipelineError::MalformedAggregate {
            transformer: transformer.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn degenerate(transformer: &str, reason: impl Into<String>) -> Self {
        PipelineError::DegenerateAggregate {
            transformer: transformer.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SpecParse(err.to_string())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::InvalidRecord(err.to_string())
    }
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for PipelineError {
    fn from(err: ort::Error) -> Self {
        PipelineError::Inference(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(PipelineError::ModelLoad("gone".into()).is_retryable());
        assert!(PipelineError::Timeout(50).is_retryable());
        assert!(!PipelineError::MissingField("petal_length".into()).is_retryable());
        assert!(!PipelineError::SpecParse("bad".into()).is_retryable());
    }

    #[test]
    fn test_kind_names_are_stable() {
        let err = PipelineError::UnknownCategory {
            transformer: "class_name".into(),
            value: "Iris-unknown".into(),
        };
        assert_eq!(err.kind(), ErrorKind::UnknownCategory);
        assert_eq!(err.kind().as_str(), "unknown_category");
        assert!(err.to_string().contains("Iris-unknown"));
    }

    #[test]
    fn test_layout_mismatch_is_inference_failure() {
        let err = PipelineError::LayoutMismatch {
            input: "features".into(),
            reason: "position 0".into(),
        };
        assert!(err.is_inference_failure());
        assert!(!PipelineError::FieldNotFound("x".into()).is_inference_failure());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err: PipelineError = json_err.into();
        assert!(matches!(err, PipelineError::SpecParse(_)));
    }
}
