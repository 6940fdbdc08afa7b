//! Registry mapping transformer kind identifiers to implementations

use crate::error::{PipelineError, Result};
use crate::transformers::{Identity, MinMaxScaler, OneHotEncoder, StandardScaler, TransformerSpec};
use crate::types::Field;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// A transformer kind: turns a spec's params and aggregates into a ready transform.
///
/// Adding a kind means implementing this trait and registering it; neither
/// the feature builder nor the pipeline changes.
pub trait TransformerKind: Send + Sync {
    /// Bare identifier this kind is registered under.
    fn kind(&self) -> &'static str;

    /// Parse params and aggregates once so per-record calls only do arithmetic.
    fn prepare(&self, spec: &TransformerSpec) -> Result<Box<dyn PreparedTransformer>>;
}

/// A transformer bound to its training statistics.
pub trait PreparedTransformer: Send + Sync + fmt::Debug {
    /// Number of floats produced per record
    fn width(&self) -> usize;

    fn transform(&self, inputs: &[&Field]) -> Result<Vec<f64>>;
}

/// Kind identifier to implementation.
pub struct TransformerRegistry {
    kinds: HashMap<String, Box<dyn TransformerKind>>,
}

impl TransformerRegistry {
    /// Registry with every built-in kind
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(StandardScaler);
        registry.register(OneHotEncoder);
        registry.register(MinMaxScaler);
        registry.register(Identity);
        registry
    }

    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Register a kind, replacing any previous one with the same identifier.
    pub fn register<K: TransformerKind + 'static>(&mut self, kind: K) -> &mut Self {
        let id = kind.kind().to_string();
        if self.kinds.insert(id.clone(), Box::new(kind)).is_some() {
            debug!(kind = %id, "Replaced transformer kind");
        }
        self
    }

    /// Resolve a kind by exact identifier, then by its last `.`-separated segment.
    pub fn get(&self, kind: &str) -> Result<&dyn TransformerKind> {
        let short = kind.rsplit('.').next().unwrap_or(kind);
        self.kinds
            .get(kind)
            .or_else(|| self.kinds.get(short))
            .map(|k| &**k)
            .ok_or_else(|| PipelineError::UnsupportedTransformer(kind.to_string()))
    }

    /// Prepare a spec and check its width against the declared feature names.
    pub fn prepare(&self, spec: &TransformerSpec) -> Result<Box<dyn PreparedTransformer>> {
        let prepared = self.get(&spec.kind)?.prepare(spec)?;
        if prepared.width() != spec.width() {
            return Err(PipelineError::FeatureArity {
                transformer: spec.name.clone(),
                declared: spec.width(),
                actual: prepared.width(),
            });
        }
        Ok(prepared)
    }

    /// One-shot application: prepare the spec then transform the given inputs.
    pub fn apply(&self, spec: &TransformerSpec, inputs: &[&Field]) -> Result<Vec<f64>> {
        self.prepare(spec)?.transform(inputs)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.get(kind).is_ok()
    }

    /// Registered identifiers, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
