//! Batch Scorer - Main Entry Point
//!
//! Scores a CSV file of iris records through the transformer spec and the
//! model, writing one JSON line per record to stdout.
//!
//! Usage: batch-scorer [config.toml] [records.csv]

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::StringRecord;
use futures::StreamExt;
use model_serving::{
    config::{AppConfig, LoggingConfig},
    metrics::ScoringMetrics,
    models::{ModelLoader, OutputSelector},
    pipeline::ModelPipeline,
    transformers::TransformerRegistry,
    types::{Iris, Record, RecordSchema},
    FeaturePlan, InferenceSession, PipelineError,
};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One output line
#[derive(Debug, Serialize)]
struct ScoredRow {
    row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    predicted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    predicted_label: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    scored_at: DateTime<Utc>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config_path = args.get(1).map(|s| s.as_str()).unwrap_or("config/config.toml");
    let input_path = args.get(2).map(|s| s.as_str()).unwrap_or("tests/fixtures/iris.csv");

    let config = AppConfig::load_from_path(config_path)?;
    init_logging(&config.logging)?;

    info!("Starting Batch Scorer");
    info!(
        model_dir = %config.model.model_dir,
        spec = %config.pipeline.spec_path,
        output = %config.model.output,
        "Configuration loaded from {}",
        config_path
    );

    let loader = ModelLoader::new(config.model.sessions, config.model.onnx_threads);
    let session = InferenceSession::load(&config.model.model_dir, &loader)
        .with_context(|| format!("Failed to load model from {}", config.model.model_dir))?;
    let pipeline = ModelPipeline::new(session, Arc::new(TransformerRegistry::new()));

    let spec_json = config.read_spec()?;
    let plan = Arc::new(pipeline.compile(&spec_json).context("Failed to compile spec")?);
    info!(
        width = plan.width(),
        features = ?plan.feature_names().collect::<Vec<_>>(),
        "Feature plan compiled"
    );

    let input = File::open(input_path)
        .with_context(|| format!("Failed to read records from {}", input_path))?;
    let rows = RecordSchema::csv_reader(input)
        .into_records()
        .enumerate()
        .map(|(i, row)| {
            let line = match &row {
                Ok(record) => record.position().map_or(i as u64 + 1, |p| p.line()),
                Err(e) => e.position().map_or(i as u64 + 1, |p| p.line()),
            };
            (line as usize, row)
        });

    info!(
        workers = config.pipeline.workers,
        timeout_ms = config.pipeline.timeout_ms,
        "Scoring {}",
        input_path
    );

    let metrics = Arc::new(ScoringMetrics::new());
    let timeout = Duration::from_millis(config.pipeline.timeout_ms);
    let selector = config.model.output.clone();

    let mut scored = futures::stream::iter(rows)
        .map(|(row, columns)| {
            let pipeline = pipeline.clone();
            let plan = plan.clone();
            let metrics = metrics.clone();
            let selector = selector.clone();
            async move { score_row(row, columns, &pipeline, &plan, selector, timeout, &metrics).await }
        })
        .buffer_unordered(config.pipeline.workers.max(1));

    let stdout = std::io::stdout();
    while let Some(result) = scored.next().await {
        let mut out = stdout.lock();
        serde_json::to_writer(&mut out, &result)?;
        writeln!(out)?;
    }

    if let Some(accuracy) = metrics.accuracy() {
        info!(accuracy = accuracy, "Scoring finished");
    }
    metrics.print_summary();

    Ok(())
}

async fn score_row(
    row: usize,
    columns: csv::Result<StringRecord>,
    pipeline: &ModelPipeline,
    plan: &FeaturePlan,
    selector: OutputSelector,
    timeout: Duration,
    metrics: &ScoringMetrics,
) -> ScoredRow {
    let start = Instant::now();
    let mut actual = None;

    let result: Result<usize, PipelineError> = async {
        let record = Iris::schema().bind_row(&columns?)?;
        actual = Iris::label_of(&record);
        let envelope = pipeline.extract_with_plan(&record, plan)?;
        pipeline.predict_with_timeout(envelope, selector, timeout).await
    }
    .await;

    match result {
        Ok(class) => {
            metrics.record_prediction(start.elapsed(), class, actual);
            debug!(row = row, class = class, "Row scored");
            ScoredRow {
                row,
                predicted: Some(class),
                predicted_label: Iris::CLASSES.get(class).copied(),
                actual,
                error_kind: None,
                error: None,
                scored_at: Utc::now(),
            }
        }
        Err(e) => {
            metrics.record_failure(e.kind());
            warn!(row = row, error = %e, retryable = e.is_retryable(), "Row failed");
            ScoredRow {
                row,
                predicted: None,
                predicted_label: None,
                actual,
                error_kind: Some(e.kind().as_str()),
                error: Some(e.to_string()),
                scored_at: Utc::now(),
            }
        }
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("model_serving={}", logging.level).parse()?)
        .add_directive(format!("batch_scorer={}", logging.level).parse()?);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    Ok(())
}
