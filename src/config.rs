//! Configuration management for the scoring pipeline

use crate::models::OutputSelector;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Artifact directory holding model.onnx
    pub model_dir: String,
    /// Independent ONNX sessions kept for concurrent predictions
    #[serde(default = "default_sessions")]
    pub sessions: usize,
    /// Number of threads for ONNX inference per session (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Output tensor holding the prediction: index or name
    #[serde(default)]
    pub output: OutputSelector,
}

fn default_sessions() -> usize {
    1
}

fn default_onnx_threads() -> usize {
    1
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Transformer spec JSON produced at training time
    pub spec_path: String,
    /// Per-prediction deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Records scored concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_workers() -> usize {
    4
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Read the transformer spec document named by `pipeline.spec_path`.
    pub fn read_spec(&self) -> Result<String> {
        std::fs::read_to_string(&self.pipeline.spec_path)
            .with_context(|| format!("Failed to read spec {}", self.pipeline.spec_path))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                model_dir: "models".to_string(),
                sessions: default_sessions(),
                onnx_threads: default_onnx_threads(),
                output: OutputSelector::default(),
            },
            pipeline: PipelineConfig {
                spec_path: "spec.json".to_string(),
                timeout_ms: default_timeout_ms(),
                workers: default_workers(),
            },
            logging: LoggingConfig::default(),
        }
    }
}
