//! Output tensor selection and class-index decoding

use crate::error::{PipelineError, Result};
use crate::models::runtime::{OutputData, OutputTensor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which graph output holds the prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputSelector {
    /// Position in the graph's declared outputs
    Index(usize),
    Name(String),
}

impl OutputSelector {
    /// Position of the selected output among `outputs`.
    pub fn resolve(&self, outputs: &[String]) -> Result<usize> {
        match self {
            OutputSelector::Index(i) if *i < outputs.len() => Ok(*i),
            OutputSelector::Index(i) => Err(PipelineError::Inference(format!(
                "output index {} out of range, model has {} outputs",
                i,
                outputs.len()
            ))),
            OutputSelector::Name(name) => outputs.iter().position(|o| o == name).ok_or_else(|| {
                PipelineError::Inference(format!("model has no output named '{}'", name))
            }),
        }
    }
}

impl Default for OutputSelector {
    fn default() -> Self {
        OutputSelector::Index(1)
    }
}

impl From<usize> for OutputSelector {
    fn from(index: usize) -> Self {
        OutputSelector::Index(index)
    }
}

impl From<&str> for OutputSelector {
    fn from(name: &str) -> Self {
        OutputSelector::Name(name.to_string())
    }
}

impl fmt::Display for OutputSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSelector::Index(i) => write!(f, "#{}", i),
            OutputSelector::Name(n) => f.write_str(n),
        }
    }
}

/// Decode a single-record output tensor into a class index.
///
/// Float scores `[C]` or `[1, C]` decode by argmax; integer class ids
/// `[]`, `[1]` or `[1, 1]` are taken as-is.
pub fn decode_class(tensor: &OutputTensor) -> Result<usize> {
    match &tensor.data {
        OutputData::F32(v) => {
            check_score_shape(&tensor.shape, v.len())?;
            argmax(v.iter().map(|&x| x as f64))
        }
        OutputData::F64(v) => {
            check_score_shape(&tensor.shape, v.len())?;
            argmax(v.iter().copied())
        }
        OutputData::I64(v) => {
            let single = matches!(tensor.shape.as_slice(), [] | [1] | [1, 1]);
            match (single, v.as_slice()) {
                (true, [id]) if *id >= 0 => Ok(*id as usize),
                (true, [id]) => Err(PipelineError::Inference(format!("negative class id {}", id))),
                _ => Err(PipelineError::Inference(format!(
                    "expected a single class id, got shape {:?}",
                    tensor.shape
                ))),
            }
        }
    }
}

fn check_score_shape(shape: &[i64], len: usize) -> Result<()> {
    let classes = match shape {
        [c] => *c,
        [1, c] => *c,
        _ => {
            return Err(PipelineError::Inference(format!(
                "expected scores of shape [C] or [1, C], got {:?}",
                shape
            )))
        }
    };
    if classes <= 0 || classes as usize != len {
        return Err(PipelineError::Inference(format!(
            "score shape {:?} does not match {} values",
            shape, len
        )));
    }
    Ok(())
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: impl IntoIterator<Item = f64>) -> Result<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        if v.is_nan() {
            return Err(PipelineError::Inference(format!("score {} is NaN", i)));
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| PipelineError::Inference("empty score vector".to_string()))
}
