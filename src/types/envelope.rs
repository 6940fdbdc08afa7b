//! Feature vectors and the named-tensor envelopes fed to a model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered feature values together with the feature name of each slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            names: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Append one transformer's output. Callers guarantee equal lengths.
    pub(crate) fn extend_segment(&mut self, names: &[String], values: Vec<f64>) {
        debug_assert_eq!(names.len(), values.len());
        self.names.extend(names.iter().cloned());
        self.values.extend(values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<f64>) {
        (self.names, self.values)
    }
}

/// One named input tensor of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputTensor {
    /// Dimensions, batch first
    pub shape: Vec<i64>,
    /// Row-major values
    pub values: Vec<f64>,
    /// Feature name of each column
    pub feature_names: Vec<String>,
}

impl InputTensor {
    /// A `[1, n]` row holding a single record.
    pub fn row(feature_names: Vec<String>, values: Vec<f64>) -> Self {
        Self {
            shape: vec![1, values.len() as i64],
            values,
            feature_names,
        }
    }

    /// Number of feature columns (last dimension)
    pub fn width(&self) -> usize {
        self.shape.last().map(|&d| d.max(0) as usize).unwrap_or(0)
    }

    /// Leading (batch) dimension
    pub fn batch_size(&self) -> usize {
        match self.shape.len() {
            0 => 1,
            1 => 1,
            _ => self.shape[0].max(0) as usize,
        }
    }
}

/// Named-tensor map handed to the graph runtime for one prediction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputEnvelope {
    tensors: BTreeMap<String, InputTensor>,
}

impl InputEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: InputTensor) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&InputTensor> {
        self.tensors.get(name)
    }

    pub fn tensor_names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn tensors(&self) -> impl Iterator<Item = (&str, &InputTensor)> {
        self.tensors.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_tensor_shape() {
        let tensor = InputTensor::row(vec!["a".into(), "b".into()], vec![1.0, 2.0]);
        assert_eq!(tensor.shape, vec![1, 2]);
        assert_eq!(tensor.width(), 2);
        assert_eq!(tensor.batch_size(), 1);
    }

    #[test]
    fn test_feature_vector_segments_keep_order() {
        let mut vector = FeatureVector::with_capacity(3);
        vector.extend_segment(&["x".to_string()], vec![0.5]);
        vector.extend_segment(&["y_a".to_string(), "y_b".to_string()], vec![0.0, 1.0]);

        assert_eq!(vector.len(), 3);
        assert_eq!(vector.names(), &["x", "y_a", "y_b"]);
        assert_eq!(vector.values(), &[0.5, 0.0, 1.0]);
    }
}
