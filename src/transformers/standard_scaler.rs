//! Standardizing scaler: `(x - mean) / std` with training-time statistics.

use crate::error::{PipelineError, Result};
use crate::transformers::{
    numeric_value, parse_numbers, single_input, MissingPolicy, PreparedTransformer,
    TransformerKind, TransformerSpec,
};
use crate::types::Field;

/// Kind handler for standardizing scalers.
///
/// Aggregates are `mean,std`. Params `withMean` (default `false`) and
/// `withStd` (default `true`) select which half of the formula applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardScaler;

/// Parsed `mean,std` aggregate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalerStats {
    pub mean: f64,
    pub std: f64,
}

impl ScalerStats {
    pub fn parse(transformer: &str, aggregates: &str) -> Result<Self> {
        let [mean, std] = parse_numbers::<2>(transformer, aggregates)?;
        Ok(Self { mean, std })
    }

    /// Shortest representation that parses back to the same bits.
    pub fn to_aggregates(&self) -> String {
        format!("{},{}", self.mean, self.std)
    }
}

#[derive(Debug, Clone)]
pub struct PreparedStandardScaler {
    name: String,
    stats: ScalerStats,
    with_mean: bool,
    with_std: bool,
    missing: MissingPolicy,
}

impl PreparedStandardScaler {
    pub fn scale(&self, x: f64) -> f64 {
        let centered = if self.with_mean { x - self.stats.mean } else { x };
        if self.with_std {
            centered / self.stats.std
        } else {
            centered
        }
    }
}

impl TransformerKind for StandardScaler {
    fn kind(&self) -> &'static str {
        "StandardScaler"
    }

    fn prepare(&self, spec: &TransformerSpec) -> Result<Box<dyn PreparedTransformer>> {
        let stats = ScalerStats::parse(&spec.name, &spec.aggregates)?;
        let with_mean = spec.bool_param("withMean", false)?;
        let with_std = spec.bool_param("withStd", true)?;

        if with_mean && !stats.mean.is_finite() {
            return Err(PipelineError::degenerate(
                &spec.name,
                format!("mean is {}", stats.mean),
            ));
        }
        if with_std && (stats.std == 0.0 || !stats.std.is_finite()) {
            return Err(PipelineError::degenerate(
                &spec.name,
                format!("std is {}", stats.std),
            ));
        }

        Ok(Box::new(PreparedStandardScaler {
            name: spec.name.clone(),
            stats,
            with_mean,
            with_std,
            missing: MissingPolicy::from_spec(spec)?,
        }))
    }
}

impl PreparedTransformer for PreparedStandardScaler {
    fn width(&self) -> usize {
        1
    }

    fn transform(&self, inputs: &[&Field]) -> Result<Vec<f64>> {
        let field = single_input(&self.name, inputs)?;
        let x = self
            .missing
            .resolve(&self.name, numeric_value(&self.name, field)?)?;
        Ok(vec![self.scale(x)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn spec(params: &[(&str, &str)], aggregates: &str) -> TransformerSpec {
        TransformerSpec {
            kind: "StandardScaler".to_string(),
            name: "petal_length".to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            feature_names: vec!["petal_length".to_string()],
            aggregates: aggregates.to_string(),
        }
    }

    const BOTH: &[(&str, &str)] = &[("withMean", "true"), ("withStd", "true")];

    #[test]
    fn test_standardize() {
        let scaler = StandardScaler
            .prepare(&spec(BOTH, "3.7586666666666675,1.7585291834055217"))
            .unwrap();
        let out = scaler.transform(&[&Field::number(5.1)]).unwrap();
        assert_eq!(out, vec![(5.1 - 3.7586666666666675) / 1.7585291834055217]);
    }

    #[test]
    fn test_param_combinations() {
        let x = Field::number(7.0);
        let agg = "2,4";

        let mean_only = StandardScaler
            .prepare(&spec(&[("withMean", "true"), ("withStd", "false")], agg))
            .unwrap();
        assert_eq!(mean_only.transform(&[&x]).unwrap(), vec![5.0]);

        // withStd defaults to true, withMean to false
        let std_only = StandardScaler.prepare(&spec(&[], agg)).unwrap();
        assert_eq!(std_only.transform(&[&x]).unwrap(), vec![1.75]);

        let neither = StandardScaler
            .prepare(&spec(&[("withStd", "false")], agg))
            .unwrap();
        assert_eq!(neither.transform(&[&x]).unwrap(), vec![7.0]);
    }

    #[test]
    fn test_missing_value_fails_by_default() {
        let scaler = StandardScaler.prepare(&spec(BOTH, "1,2")).unwrap();
        let err = scaler.transform(&[&Field::Absent]).unwrap_err();
        assert!(matches!(err, PipelineError::MissingField(f) if f == "petal_length"));
    }

    #[test]
    fn test_missing_value_substitution() {
        let scaler = StandardScaler
            .prepare(&spec(
                &[("withMean", "true"), ("withStd", "true"), ("missingValue", "1")],
                "1,2",
            ))
            .unwrap();
        assert_eq!(scaler.transform(&[&Field::Absent]).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_present_zero_is_not_missing() {
        let scaler = StandardScaler.prepare(&spec(BOTH, "1,2")).unwrap();
        assert_eq!(scaler.transform(&[&Field::number(0.0)]).unwrap(), vec![-0.5]);
    }

    #[test]
    fn test_zero_std_is_degenerate() {
        let err = StandardScaler.prepare(&spec(BOTH, "1,0")).unwrap_err();
        assert!(matches!(err, PipelineError::DegenerateAggregate { .. }));

        // without std scaling a zero std is irrelevant
        assert!(StandardScaler
            .prepare(&spec(&[("withMean", "true"), ("withStd", "false")], "1,0"))
            .is_ok());
    }

    #[test]
    fn test_malformed_aggregates() {
        for agg in ["", "1.0", "1,2,3", "mean,std", "1;2"] {
            let err = StandardScaler.prepare(&spec(BOTH, agg)).unwrap_err();
            assert!(
                matches!(err, PipelineError::MalformedAggregate { .. }),
                "{agg:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_text_value_is_parsed() {
        let scaler = StandardScaler.prepare(&spec(BOTH, "1,2")).unwrap();
        assert_eq!(scaler.transform(&[&Field::text("3")]).unwrap(), vec![1.0]);
        assert!(matches!(
            scaler.transform(&[&Field::text("tall")]),
            Err(PipelineError::InvalidRecord(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_aggregate_round_trip(mean in any::<f64>(), std in any::<f64>()) {
            prop_assume!(mean.is_finite() && std.is_finite());
            let stats = ScalerStats { mean, std };
            let parsed = ScalerStats::parse("p", &stats.to_aggregates()).unwrap();
            prop_assert_eq!(parsed.mean.to_bits(), mean.to_bits());
            prop_assert_eq!(parsed.std.to_bits(), std.to_bits());
        }

        #[test]
        fn prop_matches_closed_form(x in -1e6f64..1e6, mean in -1e3f64..1e3, std in 1e-3f64..1e3) {
            let stats = ScalerStats { mean, std };
            let scaler = StandardScaler.prepare(&spec(BOTH, &stats.to_aggregates())).unwrap();
            let out = scaler.transform(&[&Field::number(x)]).unwrap();
            prop_assert_eq!(out.len(), 1);
            prop_assert_eq!(out[0].to_bits(), ((x - mean) / std).to_bits());
        }
    }
}
