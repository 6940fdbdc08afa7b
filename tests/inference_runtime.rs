//! Inference behavior against in-test graph runtimes.

use model_serving::models::{GraphRuntime, LoadedModel, ModelSignature, OutputData, OutputTensor};
use model_serving::transformers::{PreparedTransformer, TransformerKind};
use model_serving::types::{Iris, Record};
use model_serving::{
    ErrorKind, Field, InferenceSession, InputEnvelope, ModelPipeline, OutputSelector,
    PipelineError, TransformerRegistry, TransformerSpec,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SPEC: &str = include_str!("fixtures/iris_settings.json");

/// Argmax over the one-hot slots, after an optional delay.
struct OneHotReader {
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl GraphRuntime for OneHotReader {
    fn input_names(&self) -> Vec<String> {
        vec!["features".to_string()]
    }

    fn output_names(&self) -> Vec<String> {
        vec!["class_ids".to_string(), "probabilities".to_string()]
    }

    fn run(&self, envelope: &InputEnvelope) -> model_serving::Result<Vec<OutputTensor>> {
        std::thread::sleep(self.delay);
        self.calls.fetch_add(1, Ordering::SeqCst);
        let values = &envelope
            .get("features")
            .ok_or_else(|| PipelineError::Inference("no features".into()))?
            .values;
        let scores = values[4..].to_vec();
        let class = scores
            .iter()
            .enumerate()
            .fold(0, |best, (i, v)| if *v > scores[best] { i } else { best });
        Ok(vec![
            OutputTensor {
                shape: vec![1, 1],
                data: OutputData::I64(vec![class as i64]),
            },
            OutputTensor {
                shape: vec![1, 3],
                data: OutputData::F64(scores),
            },
        ])
    }
}

fn pipeline(delay: Duration) -> (ModelPipeline, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let runtime = OneHotReader {
        delay,
        calls: calls.clone(),
    };
    let signature =
        ModelSignature::parse(include_str!("fixtures/iris_model/signature.json")).unwrap();
    let model = LoadedModel::from_runtime("one-hot", Box::new(runtime), Some(signature)).unwrap();
    let pipeline = ModelPipeline::new(
        InferenceSession::new(model),
        Arc::new(TransformerRegistry::new()),
    );
    (pipeline, calls)
}

fn versicolor() -> model_serving::RawRecord {
    Iris::schema()
        .parse_csv_line("6.4,3.2,4.5,1.5,Iris-versicolor")
        .unwrap()
}

#[test]
fn test_pipeline_with_custom_runtime() {
    let (pipeline, calls) = pipeline(Duration::ZERO);
    let envelope = pipeline.extract_features(&versicolor(), SPEC).unwrap();
    assert_eq!(pipeline.predict(&envelope, &OutputSelector::Index(1)).unwrap(), 1);
    assert_eq!(pipeline.predict(&envelope, &OutputSelector::from("class_ids")).unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_deadline_expires_cleanly() {
    let (pipeline, calls) = pipeline(Duration::from_millis(300));
    let envelope = pipeline.extract_features(&versicolor(), SPEC).unwrap();

    let err = pipeline
        .predict_with_timeout(envelope.clone(), OutputSelector::default(), Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Timeout(20)));
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.is_retryable());

    // The abandoned pass still completes and the model stays usable.
    let class = pipeline
        .predict_with_timeout(envelope, OutputSelector::default(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(class, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_concurrent_callers() {
    let (pipeline, calls) = pipeline(Duration::from_millis(1));
    let plan = pipeline.compile(SPEC).unwrap();
    let rows = [
        ("5.1,3.5,1.4,0.2,Iris-setosa", 0),
        ("6.4,3.2,4.5,1.5,Iris-versicolor", 1),
        ("6.3,3.3,6.0,2.5,Iris-virginica", 2),
    ];

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for (line, expected) in rows {
                    let record = Iris::schema().parse_csv_line(line).unwrap();
                    let envelope = pipeline.extract_with_plan(&record, &plan).unwrap();
                    assert_eq!(
                        pipeline.predict(&envelope, &OutputSelector::default()).unwrap(),
                        expected
                    );
                }
            });
        }
    });
    assert_eq!(calls.load(Ordering::SeqCst), 24);
}

/// Registered kind that reads a numeric field and emits it negated.
struct Negate;

#[derive(Debug)]
struct PreparedNegate;

impl TransformerKind for Negate {
    fn kind(&self) -> &'static str {
        "Negate"
    }

    fn prepare(
        &self,
        _spec: &TransformerSpec,
    ) -> model_serving::Result<Box<dyn PreparedTransformer>> {
        Ok(Box::new(PreparedNegate))
    }
}

impl PreparedTransformer for PreparedNegate {
    fn width(&self) -> usize {
        1
    }

    fn transform(&self, inputs: &[&Field]) -> model_serving::Result<Vec<f64>> {
        match inputs {
            [Field::Present(model_serving::types::Scalar::Number(x))] => Ok(vec![-x]),
            _ => Err(PipelineError::MissingField("x".into())),
        }
    }
}

#[test]
fn test_registered_kind_extends_pipeline() {
    let mut registry = TransformerRegistry::new();
    registry.register(Negate);

    let model = LoadedModel::from_runtime(
        "one-hot",
        Box::new(OneHotReader {
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        None,
    )
    .unwrap();
    let pipeline = ModelPipeline::new(InferenceSession::new(model), Arc::new(registry));

    let spec = r#"[{"cls":"com.example.Negate","name":"x","featureNames":["neg_x"],"aggregators":""}]"#;
    let record = model_serving::RawRecord::new().with("x", Field::number(2.5));
    let envelope = pipeline.extract_features(&record, spec).unwrap();
    assert_eq!(envelope.get("features").unwrap().values, vec![-2.5]);
}
