//! Boundary to the graph-execution runtime.

use crate::error::Result;
use crate::types::InputEnvelope;

/// Element data of an output tensor
#[derive(Debug, Clone, PartialEq)]
pub enum OutputData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I64(Vec<i64>),
}

impl OutputData {
    pub fn len(&self) -> usize {
        match self {
            OutputData::F32(v) => v.len(),
            OutputData::F64(v) => v.len(),
            OutputData::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            OutputData::F32(_) => "float32",
            OutputData::F64(_) => "float64",
            OutputData::I64(_) => "int64",
        }
    }
}

/// An owned output tensor copied out of the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    pub shape: Vec<i64>,
    pub data: OutputData,
}

/// Executes one forward pass of a loaded computation graph.
///
/// Implementations must tolerate concurrent `run` calls from many threads.
pub trait GraphRuntime: Send + Sync {
    /// Input tensor names the graph requires
    fn input_names(&self) -> Vec<String>;

    /// Output tensor names, in the graph's declared order
    fn output_names(&self) -> Vec<String>;

    /// Run the graph and return every declared output, in declared order.
    fn run(&self, envelope: &InputEnvelope) -> Result<Vec<OutputTensor>>;
}
