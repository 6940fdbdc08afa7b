//! Min-max scaling into a configured output range.

use crate::error::{PipelineError, Result};
use crate::transformers::{
    numeric_value, parse_numbers, single_input, MissingPolicy, PreparedTransformer,
    TransformerKind, TransformerSpec,
};
use crate::types::Field;

/// Aggregates are `min,max` observed at training time; params `min`/`max`
/// (default 0 and 1) give the output range. Inputs outside the trained range
/// are clamped to it first.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinMaxScaler;

#[derive(Debug, Clone)]
pub struct PreparedMinMaxScaler {
    name: String,
    data_min: f64,
    data_max: f64,
    out_min: f64,
    out_max: f64,
    missing: MissingPolicy,
}

impl TransformerKind for MinMaxScaler {
    fn kind(&self) -> &'static str {
        "MinMaxScaler"
    }

    fn prepare(&self, spec: &TransformerSpec) -> Result<Box<dyn PreparedTransformer>> {
        let [data_min, data_max] = parse_numbers::<2>(&spec.name, &spec.aggregates)?;
        if !(data_min.is_finite() && data_max.is_finite()) || data_max <= data_min {
            return Err(PipelineError::degenerate(
                &spec.name,
                format!("range [{}, {}] is empty", data_min, data_max),
            ));
        }

        let out_min = spec.f64_param("min")?.unwrap_or(0.0);
        let out_max = spec.f64_param("max")?.unwrap_or(1.0);
        if out_max < out_min {
            return Err(PipelineError::SpecParse(format!(
                "'{}': min {} is above max {}",
                spec.name, out_min, out_max
            )));
        }

        Ok(Box::new(PreparedMinMaxScaler {
            name: spec.name.clone(),
            data_min,
            data_max,
            out_min,
            out_max,
            missing: MissingPolicy::from_spec(spec)?,
        }))
    }
}

impl PreparedTransformer for PreparedMinMaxScaler {
    fn width(&self) -> usize {
        1
    }

    fn transform(&self, inputs: &[&Field]) -> Result<Vec<f64>> {
        let field = single_input(&self.name, inputs)?;
        let x = self
            .missing
            .resolve(&self.name, numeric_value(&self.name, field)?)?
            .clamp(self.data_min, self.data_max);
        let unit = (x - self.data_min) / (self.data_max - self.data_min);
        Ok(vec![unit * (self.out_max - self.out_min) + self.out_min])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(aggregates: &str, params: &[(&str, &str)]) -> TransformerSpec {
        TransformerSpec {
            kind: "MinMaxScaler".to_string(),
            name: "sepal_width".to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            feature_names: vec!["sepal_width".to_string()],
            aggregates: aggregates.to_string(),
        }
    }

    #[test]
    fn test_scale_into_unit_range() {
        let scaler = MinMaxScaler.prepare(&spec("2,4", &[])).unwrap();
        assert_eq!(scaler.transform(&[&Field::number(3.0)]).unwrap(), vec![0.5]);
        assert_eq!(scaler.transform(&[&Field::number(2.0)]).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let scaler = MinMaxScaler.prepare(&spec("2,4", &[])).unwrap();
        assert_eq!(scaler.transform(&[&Field::number(10.0)]).unwrap(), vec![1.0]);
        assert_eq!(scaler.transform(&[&Field::number(-1.0)]).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_custom_output_range() {
        let scaler = MinMaxScaler
            .prepare(&spec("0,10", &[("min", "-1"), ("max", "1")]))
            .unwrap();
        assert_eq!(scaler.transform(&[&Field::number(5.0)]).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_empty_range_is_degenerate() {
        assert!(matches!(
            MinMaxScaler.prepare(&spec("3,3", &[])),
            Err(PipelineError::DegenerateAggregate { .. })
        ));
    }

    #[test]
    fn test_missing_value() {
        let strict = MinMaxScaler.prepare(&spec("2,4", &[])).unwrap();
        assert!(matches!(
            strict.transform(&[&Field::Absent]),
            Err(PipelineError::MissingField(_))
        ));

        let lenient = MinMaxScaler
            .prepare(&spec("2,4", &[("missingValue", "4")]))
            .unwrap();
        assert_eq!(lenient.transform(&[&Field::Absent]).unwrap(), vec![1.0]);
    }
}
