//! Artifact loading failures against throwaway directories.
#![cfg(feature = "onnx")]

use model_serving::models::loader::{GRAPH_FILE, SIGNATURE_FILE, VARIABLES_DIR};
use model_serving::{InferenceSession, ModelLoader, PipelineError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const MODEL_DIR: &str = "tests/fixtures/iris_model";

/// Copy of the fixture artifact that tests can damage.
fn fixture_copy() -> TempDir {
    let dir = TempDir::new().unwrap();
    let src = Path::new(MODEL_DIR);
    fs::copy(src.join(GRAPH_FILE), dir.path().join(GRAPH_FILE)).unwrap();
    fs::copy(src.join(SIGNATURE_FILE), dir.path().join(SIGNATURE_FILE)).unwrap();
    fs::create_dir(dir.path().join(VARIABLES_DIR)).unwrap();
    for entry in fs::read_dir(src.join(VARIABLES_DIR)).unwrap() {
        let entry = entry.unwrap();
        fs::copy(entry.path(), dir.path().join(VARIABLES_DIR).join(entry.file_name())).unwrap();
    }
    dir
}

fn load(dir: &Path) -> Result<InferenceSession, PipelineError> {
    InferenceSession::load(dir, &ModelLoader::default())
}

#[test]
fn test_fixture_loads() {
    let session = load(Path::new(MODEL_DIR)).unwrap();
    assert_eq!(session.model().name, "iris_model");
    assert_eq!(session.model().output_names(), vec!["class_ids", "probabilities"]);
    assert_eq!(session.model().signature().inputs[0].feature_names.len(), 7);
}

#[test]
fn test_copied_artifact_loads() {
    let dir = fixture_copy();
    assert!(load(dir.path()).is_ok());
}

#[test]
fn test_missing_directory() {
    let err = load(Path::new("tests/fixtures/no_such_model")).unwrap_err();
    assert!(matches!(err, PipelineError::ModelLoad(_)));
    assert!(err.is_retryable());
}

#[test]
fn test_empty_graph() {
    let dir = fixture_copy();
    fs::write(dir.path().join(GRAPH_FILE), b"").unwrap();
    assert!(matches!(load(dir.path()), Err(PipelineError::ModelLoad(_))));
}

#[test]
fn test_truncated_graph() {
    let dir = fixture_copy();
    let graph = fs::read(dir.path().join(GRAPH_FILE)).unwrap();
    fs::write(dir.path().join(GRAPH_FILE), &graph[..graph.len() / 3]).unwrap();
    assert!(matches!(load(dir.path()), Err(PipelineError::ModelLoad(_))));
}

#[test]
fn test_empty_weight_shard() {
    let dir = fixture_copy();
    let shard = fs::read_dir(dir.path().join(VARIABLES_DIR))
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    fs::write(shard, b"").unwrap();
    assert!(matches!(load(dir.path()), Err(PipelineError::ModelLoad(_))));
}

#[test]
fn test_unsupported_signature_version() {
    let dir = fixture_copy();
    let signature = fs::read_to_string(dir.path().join(SIGNATURE_FILE)).unwrap();
    fs::write(
        dir.path().join(SIGNATURE_FILE),
        signature.replace("\"format_version\": 1", "\"format_version\": 7"),
    )
    .unwrap();
    assert!(matches!(load(dir.path()), Err(PipelineError::ModelLoad(_))));
}

#[test]
fn test_signature_naming_unknown_input() {
    let dir = fixture_copy();
    let signature = fs::read_to_string(dir.path().join(SIGNATURE_FILE)).unwrap();
    fs::write(
        dir.path().join(SIGNATURE_FILE),
        signature.replace("\"name\": \"features\"", "\"name\": \"inputs\""),
    )
    .unwrap();
    assert!(matches!(load(dir.path()), Err(PipelineError::ModelLoad(_))));
}

#[test]
fn test_without_signature_layout_is_unchecked() {
    let dir = fixture_copy();
    fs::remove_file(dir.path().join(SIGNATURE_FILE)).unwrap();
    let session = load(dir.path()).unwrap();
    assert_eq!(session.model().signature().inputs[0].name, "features");
    assert!(session.model().signature().inputs[0].feature_names.is_empty());
}
