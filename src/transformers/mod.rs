//! Declarative transformer specifications and their implementations.
//!
//! A specification is the ordered JSON array emitted by the training
//! pipeline. Each element names a transformer kind, the record field it
//! reads, kind-specific params, the feature names it produces and the
//! aggregated training statistics it needs, serialized as an opaque string.
//! Only the matching kind ever looks inside that string.

pub mod identity;
pub mod min_max;
pub mod one_hot;
pub mod registry;
pub mod standard_scaler;

pub use identity::Identity;
pub use min_max::MinMaxScaler;
pub use one_hot::OneHotEncoder;
pub use registry::{PreparedTransformer, TransformerKind, TransformerRegistry};
pub use standard_scaler::StandardScaler;

use crate::error::{PipelineError, Result};
use crate::types::{Field, Scalar};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One parsed transformer descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformerSpec {
    /// Transformer kind identifier (fully qualified or bare)
    #[serde(alias = "cls")]
    pub kind: String,
    /// Record field the transformer reads
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// One name per output value, in output order
    pub feature_names: Vec<String>,
    /// Kind-specific serialized training statistics
    #[serde(alias = "aggregators")]
    pub aggregates: String,
}

impl TransformerSpec {
    /// Record fields consumed by this transformer, in input order.
    pub fn input_fields(&self) -> &[String] {
        std::slice::from_ref(&self.name)
    }

    pub fn width(&self) -> usize {
        self.feature_names.len()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Boolean param accepting `true`/`false` in any case.
    pub fn bool_param(&self, key: &str, default: bool) -> Result<bool> {
        match self.param(key) {
            None => Ok(default),
            Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
            Some(v) => Err(PipelineError::SpecParse(format!(
                "'{}': param {} must be true or false, got '{}'",
                self.name, key, v
            ))),
        }
    }

    pub fn f64_param(&self, key: &str) -> Result<Option<f64>> {
        self.param(key)
            .map(|v| {
                v.trim().parse::<f64>().map_err(|e| {
                    PipelineError::SpecParse(format!(
                        "'{}': param {} is not a number ({})",
                        self.name, key, e
                    ))
                })
            })
            .transpose()
    }

    fn validate(&self) -> Result<()> {
        if self.kind.trim().is_empty() {
            return Err(PipelineError::SpecParse("transformer kind is empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(PipelineError::SpecParse(format!(
                "transformer '{}' has an empty name",
                self.kind
            )));
        }
        if self.feature_names.is_empty() {
            return Err(PipelineError::SpecParse(format!(
                "'{}' declares no feature names",
                self.name
            )));
        }
        Ok(())
    }
}

/// Ordered transformer specs; order defines the feature vector layout.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Specification {
    specs: Vec<TransformerSpec>,
}

impl Specification {
    /// Parse and validate a specification document.
    pub fn parse(json: &str) -> Result<Self> {
        let specs: Vec<TransformerSpec> = serde_json::from_str(json)?;
        Self::new(specs)
    }

    pub fn new(specs: Vec<TransformerSpec>) -> Result<Self> {
        let mut seen = HashSet::new();
        for spec in &specs {
            spec.validate()?;
            for feature in &spec.feature_names {
                if !seen.insert(feature.as_str()) {
                    return Err(PipelineError::SpecParse(format!(
                        "duplicate feature name '{}'",
                        feature
                    )));
                }
            }
        }
        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[TransformerSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Total feature vector length
    pub fn width(&self) -> usize {
        self.specs.iter().map(TransformerSpec::width).sum()
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.specs
            .iter()
            .flat_map(|s| s.feature_names.iter().map(String::as_str))
    }
}

/// What a numeric transformer does with an absent value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissingPolicy {
    Fail,
    /// Substitute this raw value before transforming
    Substitute(f64),
}

impl MissingPolicy {
    /// Read from the `missingValue` param; strict when unset.
    pub fn from_spec(spec: &TransformerSpec) -> Result<Self> {
        Ok(spec
            .f64_param("missingValue")?
            .map_or(MissingPolicy::Fail, MissingPolicy::Substitute))
    }

    pub fn resolve(&self, field: &str, value: Option<f64>) -> Result<f64> {
        match (value, self) {
            (Some(v), _) => Ok(v),
            (None, MissingPolicy::Substitute(d)) => Ok(*d),
            (None, MissingPolicy::Fail) => Err(PipelineError::MissingField(field.to_string())),
        }
    }
}

/// The single input field of a one-column transformer.
pub(crate) fn single_input<'a>(name: &str, inputs: &[&'a Field]) -> Result<&'a Field> {
    match inputs {
        [field] => Ok(*field),
        _ => Err(PipelineError::SpecParse(format!(
            "'{}' expects exactly one input field, got {}",
            name,
            inputs.len()
        ))),
    }
}

/// Read a field as a number; text is parsed, absence is `None`.
pub(crate) fn numeric_value(name: &str, field: &Field) -> Result<Option<f64>> {
    match field {
        Field::Absent => Ok(None),
        Field::Present(Scalar::Number(v)) => Ok(Some(*v)),
        Field::Present(Scalar::Text(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            PipelineError::InvalidRecord(format!("field '{}': '{}' is not numeric", name, s))
        }),
    }
}

/// Parse the comma-separated decimal numbers of a numeric aggregate.
pub(crate) fn parse_numbers<const N: usize>(transformer: &str, aggregates: &str) -> Result<[f64; N]> {
    let tokens: Vec<&str> = aggregates.split(',').map(str::trim).collect();
    if tokens.len() != N {
        return Err(PipelineError::malformed(
            transformer,
            format!("expected {} comma-separated numbers, got '{}'", N, aggregates),
        ));
    }
    let mut out = [0.0; N];
    for (slot, token) in out.iter_mut().zip(tokens) {
        *slot = token.parse::<f64>().map_err(|e| {
            PipelineError::malformed(transformer, format!("'{}': {}", token, e))
        })?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IRIS_SPEC: &str = include_str!("../../tests/fixtures/iris_settings.json");

    #[test]
    fn test_parse_reference_spec() {
        let spec = Specification::parse(IRIS_SPEC).unwrap();
        assert_eq!(spec.len(), 5);
        assert_eq!(spec.width(), 7);

        let first = &spec.specs()[0];
        assert_eq!(first.kind, "com.spotify.featran.transformers.StandardScaler");
        assert_eq!(first.name, "petal_length");
        assert_eq!(first.aggregates, "3.7586666666666675,1.7585291834055217");
        assert!(first.bool_param("withMean", false).unwrap());
    }

    #[test]
    fn test_parse_accepts_kind_and_aggregates_names() {
        let json = r#"[{"kind":"StandardScaler","name":"x","featureNames":["x"],"aggregates":"0,1"}]"#;
        let spec = Specification::parse(json).unwrap();
        assert_eq!(spec.specs()[0].kind, "StandardScaler");
        assert!(spec.specs()[0].params.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(matches!(
            Specification::parse("[{\"cls\":"),
            Err(PipelineError::SpecParse(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_required_fields() {
        let no_features = r#"[{"cls":"StandardScaler","name":"x","aggregators":"0,1"}]"#;
        assert!(matches!(
            Specification::parse(no_features),
            Err(PipelineError::SpecParse(_))
        ));

        let no_aggregates = r#"[{"cls":"StandardScaler","name":"x","featureNames":["x"]}]"#;
        assert!(matches!(
            Specification::parse(no_aggregates),
            Err(PipelineError::SpecParse(_))
        ));

        let empty_features = r#"[{"cls":"StandardScaler","name":"x","featureNames":[],"aggregators":"0,1"}]"#;
        assert!(matches!(
            Specification::parse(empty_features),
            Err(PipelineError::SpecParse(_))
        ));
    }

    #[test]
    fn test_parse_rejects_duplicate_feature_names() {
        let json = r#"[
            {"cls":"Identity","name":"x","featureNames":["x"],"aggregators":""},
            {"cls":"Identity","name":"y","featureNames":["x"],"aggregators":""}
        ]"#;
        assert!(matches!(
            Specification::parse(json),
            Err(PipelineError::SpecParse(_))
        ));
    }

    #[test]
    fn test_bool_param_rejects_garbage() {
        let mut spec: TransformerSpec = serde_json::from_str(
            r#"{"cls":"StandardScaler","name":"x","featureNames":["x"],"aggregators":"0,1"}"#,
        )
        .unwrap();
        spec.params.insert("withMean".into(), "yes".into());
        assert!(matches!(
            spec.bool_param("withMean", false),
            Err(PipelineError::SpecParse(_))
        ));
        assert!(spec.bool_param("withStd", true).unwrap());
    }

    #[test]
    fn test_missing_policy() {
        assert_eq!(MissingPolicy::Fail.resolve("x", Some(2.0)).unwrap(), 2.0);
        assert_eq!(MissingPolicy::Substitute(1.5).resolve("x", None).unwrap(), 1.5);
        assert!(matches!(
            MissingPolicy::Fail.resolve("x", None),
            Err(PipelineError::MissingField(f)) if f == "x"
        ));
    }

    #[test]
    fn test_parse_numbers() {
        let [a, b] = parse_numbers::<2>("s", " 1.5, -2 ").unwrap();
        assert_eq!((a, b), (1.5, -2.0));
        assert!(matches!(
            parse_numbers::<2>("s", "1.5"),
            Err(PipelineError::MalformedAggregate { .. })
        ));
        assert!(matches!(
            parse_numbers::<2>("s", "1.5,abc"),
            Err(PipelineError::MalformedAggregate { .. })
        ));
    }
}
