//! Pass-through of a numeric field.

use crate::error::Result;
use crate::transformers::{
    numeric_value, single_input, MissingPolicy, PreparedTransformer, TransformerKind,
    TransformerSpec,
};
use crate::types::Field;

/// Emits the raw value unchanged; aggregates are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

#[derive(Debug, Clone)]
pub struct PreparedIdentity {
    name: String,
    missing: MissingPolicy,
}

impl TransformerKind for Identity {
    fn kind(&self) -> &'static str {
        "Identity"
    }

    fn prepare(&self, spec: &TransformerSpec) -> Result<Box<dyn PreparedTransformer>> {
        Ok(Box::new(PreparedIdentity {
            name: spec.name.clone(),
            missing: MissingPolicy::from_spec(spec)?,
        }))
    }
}

impl PreparedTransformer for PreparedIdentity {
    fn width(&self) -> usize {
        1
    }

    fn transform(&self, inputs: &[&Field]) -> Result<Vec<f64>> {
        let field = single_input(&self.name, inputs)?;
        let x = self
            .missing
            .resolve(&self.name, numeric_value(&self.name, field)?)?;
        Ok(vec![x])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_pass_through() {
        let spec = TransformerSpec {
            kind: "Identity".to_string(),
            name: "age".to_string(),
            params: Default::default(),
            feature_names: vec!["age".to_string()],
            aggregates: String::new(),
        };
        let identity = Identity.prepare(&spec).unwrap();
        assert_eq!(identity.transform(&[&Field::number(42.5)]).unwrap(), vec![42.5]);
        assert!(matches!(
            identity.transform(&[&Field::Absent]),
            Err(PipelineError::MissingField(_))
        ));
    }
}
