//! Type definitions for records, feature vectors and model inputs

pub mod envelope;
pub mod record;

pub use envelope::{FeatureVector, InputEnvelope, InputTensor};
pub use record::{Field, FieldDef, FieldKind, Iris, RawRecord, Record, RecordSchema, Scalar};
