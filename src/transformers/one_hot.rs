//! One-hot encoding of a string label against a trained vocabulary.
//!
//! Aggregates are an ordered, comma-separated list of `label:<category>`
//! tokens. Categories are URL-encoded by the training side (`+` for space,
//! `%XX` for reserved bytes) so a comma inside a label cannot split a token.

use crate::error::{PipelineError, Result};
use crate::transformers::{single_input, PreparedTransformer, TransformerKind, TransformerSpec};
use crate::types::{Field, Scalar};
use std::collections::HashMap;

const LABEL_PREFIX: &str = "label:";

#[derive(Debug, Clone, Copy, Default)]
pub struct OneHotEncoder;

/// Behaviour for labels outside the vocabulary and for absent labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandleUnknown {
    /// `UnknownCategory` / `MissingField`
    #[default]
    Error,
    /// All-zero output
    Ignore,
}

impl HandleUnknown {
    fn from_spec(spec: &TransformerSpec) -> Result<Self> {
        match spec.param("handleUnknown") {
            None => Ok(HandleUnknown::Error),
            Some(v) if v.eq_ignore_ascii_case("error") => Ok(HandleUnknown::Error),
            Some(v) if v.eq_ignore_ascii_case("ignore") => Ok(HandleUnknown::Ignore),
            Some(v) => Err(PipelineError::SpecParse(format!(
                "'{}': handleUnknown must be error or ignore, got '{}'",
                spec.name, v
            ))),
        }
    }
}

/// Ordered category vocabulary decoded from an aggregate string.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    categories: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn parse(transformer: &str, aggregates: &str) -> Result<Self> {
        if aggregates.trim().is_empty() {
            return Err(PipelineError::malformed(transformer, "empty vocabulary"));
        }

        let mut categories = Vec::new();
        let mut positions = HashMap::new();
        for token in aggregates.split(',') {
            let encoded = token.strip_prefix(LABEL_PREFIX).ok_or_else(|| {
                PipelineError::malformed(
                    transformer,
                    format!("token '{}' lacks the '{}' prefix", token, LABEL_PREFIX),
                )
            })?;
            let category = url_decode(encoded)
                .ok_or_else(|| PipelineError::malformed(transformer, format!("bad escape in '{}'", token)))?;
            if positions.insert(category.clone(), categories.len()).is_some() {
                return Err(PipelineError::malformed(
                    transformer,
                    format!("duplicate category '{}'", category),
                ));
            }
            categories.push(category);
        }

        Ok(Self {
            categories,
            positions,
        })
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn position(&self, category: &str) -> Option<usize> {
        self.positions.get(category).copied()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn to_aggregates(&self) -> String {
        self.categories
            .iter()
            .map(|c| format!("{}{}", LABEL_PREFIX, url_encode(c)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone)]
pub struct PreparedOneHotEncoder {
    name: String,
    vocabulary: Vocabulary,
    handle_unknown: HandleUnknown,
}

impl TransformerKind for OneHotEncoder {
    fn kind(&self) -> &'static str {
        "OneHotEncoder"
    }

    fn prepare(&self, spec: &TransformerSpec) -> Result<Box<dyn PreparedTransformer>> {
        Ok(Box::new(PreparedOneHotEncoder {
            name: spec.name.clone(),
            vocabulary: Vocabulary::parse(&spec.name, &spec.aggregates)?,
            handle_unknown: HandleUnknown::from_spec(spec)?,
        }))
    }
}

impl PreparedTransformer for PreparedOneHotEncoder {
    fn width(&self) -> usize {
        self.vocabulary.len()
    }

    fn transform(&self, inputs: &[&Field]) -> Result<Vec<f64>> {
        let mut out = vec![0.0; self.vocabulary.len()];
        let label = match single_input(&self.name, inputs)? {
            Field::Present(Scalar::Text(label)) => label,
            Field::Present(Scalar::Number(v)) => {
                return Err(PipelineError::InvalidRecord(format!(
                    "field '{}': expected a label, got number {}",
                    self.name, v
                )))
            }
            Field::Absent => {
                return match self.handle_unknown {
                    HandleUnknown::Ignore => Ok(out),
                    HandleUnknown::Error => Err(PipelineError::MissingField(self.name.clone())),
                }
            }
        };

        match (self.vocabulary.position(label), self.handle_unknown) {
            (Some(pos), _) => out[pos] = 1.0,
            (None, HandleUnknown::Ignore) => {}
            (None, HandleUnknown::Error) => {
                return Err(PipelineError::UnknownCategory {
                    transformer: self.name.clone(),
                    value: label.clone(),
                })
            }
        }
        Ok(out)
    }
}

/// Form-style URL decoding. `None` on a bad escape or invalid UTF-8.
fn url_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = input.get(i + 1..i + 3)?;
                if !hex.bytes().all(|h| h.is_ascii_hexdigit()) {
                    return None;
                }
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).ok()
}

fn url_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'*' => out.push(b as char),
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
