//! Integration tests for the quorum-core crate.
//!
//! These drive the full data path: JSON files on disk → config → frozen
//! vocabularies → split → training session → predictions file. The model
//! is the deterministic mock, so no network is involved.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use quorum_core::dataset::{AnswerRecord, RawSample};
use quorum_core::mocks::{MockModel, MockPolicy};
use quorum_core::output::{read_jsonl, read_predictions, write_predictions};
use quorum_core::{
    predict, Config, ConfigError, DataError, EpochReport, Mode, PreparedData, SampleStore,
    StoreMode, TrainingSession, Vocabulary, VocabularyError,
};
use tempfile::TempDir;

fn record(image: &str, question: &str, answers: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "image": image,
        "question": question,
        "answers": answers
            .iter()
            .map(|a| serde_json::json!({ "answer": a, "answer_confidence": "yes" }))
            .collect::<Vec<_>>(),
    })
}

fn repeat(parts: &[(&'static str, usize)]) -> Vec<&'static str> {
    parts
        .iter()
        .flat_map(|&(answer, n)| std::iter::repeat(answer).take(n))
        .collect()
}

/// Six annotated records whose answers normalize to: 2, yes, red, no,
/// blue/green (tied), cat.
fn write_fixtures(dir: &Path) -> (PathBuf, PathBuf) {
    let train = serde_json::Value::Array(vec![
        record("0.jpg", "How many dogs?", &repeat(&[("Two", 5), ("2", 5)])),
        record("1.jpg", "Is it sunny?", &repeat(&[("Yes", 10)])),
        record("2.jpg", "What color is the car?", &repeat(&[("red", 7), ("Red.", 3)])),
        record("3.jpg", "Is it raining?", &repeat(&[("no", 10)])),
        record(
            "4.jpg",
            "What color is the shirt?",
            &repeat(&[("blue", 4), ("green", 4), ("yes", 2)]),
        ),
        record("5.jpg", "What animal is this?", &repeat(&[("the cat", 10)])),
    ]);
    let test = serde_json::json!([
        { "image": "t0.jpg", "question": "What is on the table?" },
        { "image": "t1.jpg", "question": "How many cats are there?" },
        { "image": "t2.jpg", "question": "Is it night?" },
    ]);

    let train_path = dir.join("train.json");
    let test_path = dir.join("test.json");
    std::fs::write(&train_path, serde_json::to_string_pretty(&train).unwrap()).unwrap();
    std::fs::write(&test_path, serde_json::to_string(&test).unwrap()).unwrap();
    (train_path, test_path)
}

fn write_config(dir: &Path, train_path: &Path, test_path: &Path) -> Config {
    let toml = format!(
        r#"
[data]
train_path = {train:?}
train_image_dir = {images:?}
test_path = {test:?}
test_image_dir = {images:?}

[split]
train_fraction = 0.5

[training]
epochs = 2
batch_size = 2
progress_bar = false

[output]
predictions_path = {predictions:?}
metrics_path = {metrics:?}
vocabulary_path = {vocabulary:?}
"#,
        train = train_path.display().to_string(),
        test = test_path.display().to_string(),
        images = dir.join("images").display().to_string(),
        predictions = dir.join("submission.json").display().to_string(),
        metrics = dir.join("metrics.jsonl").display().to_string(),
        vocabulary = dir.join("answer_vocab.json").display().to_string(),
    );
    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, toml).unwrap();
    Config::load_from(&config_path).unwrap()
}

fn prepare() -> (TempDir, Config, PreparedData) {
    let tmp = TempDir::new().unwrap();
    let (train, test) = write_fixtures(tmp.path());
    let config = write_config(tmp.path(), &train, &test);
    let data = PreparedData::from_config(&config).unwrap();
    (tmp, config, data)
}

#[test]
fn test_prepare_builds_and_propagates_vocabularies() {
    let (_tmp, _config, data) = prepare();

    assert_eq!(data.annotated.len(), 6);
    assert_eq!(data.inference.len(), 3);
    assert_eq!(data.split.train, vec![0, 1, 2]);
    assert_eq!(data.split.valid, vec![3, 4, 5]);

    let answers = data.annotated.answer_index();
    let words: Vec<&str> = answers.iter().map(|(_, w)| w).collect();
    assert_eq!(words, vec!["2", "yes", "red", "no", "blue", "green", "cat"]);

    // Same frozen objects, not copies
    assert!(Arc::ptr_eq(answers, data.inference.answer_index()));
    assert!(Arc::ptr_eq(
        data.annotated.question_index(),
        data.inference.question_index()
    ));
}

#[test]
fn test_indexed_samples_carry_consensus() {
    let (_tmp, _config, data) = prepare();

    let first = data.annotated.get(0).unwrap();
    let labels = first.labels.unwrap();
    assert_eq!(labels.answer_ids, vec![0; 10]);
    assert_eq!(labels.consensus_id, 0);

    // blue (4) and green (5) tie at four votes each
    let tied = data.annotated.get(4).unwrap().labels.unwrap();
    assert_eq!(tied.consensus_id, 4);

    let unlabeled = data.inference.get(1).unwrap();
    assert!(unlabeled.labels.is_none());
    assert_eq!(unlabeled.normalized_question, "how many cats are there");
    assert!(data
        .inference
        .image_path(1)
        .unwrap()
        .ends_with("images/t1.jpg"));
}

#[test]
fn test_full_run_writes_metrics_and_predictions() {
    let (tmp, config, data) = prepare();
    let mut model = MockModel::new(MockPolicy::Consensus, 7);

    let reports = TrainingSession::from_config(&config)
        .run(&mut model, &data.annotated, &data.split)
        .unwrap();
    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert!((report.train.mean_simple_accuracy - 1.0).abs() < 1e-12);
        assert_eq!(report.train.batches, 2);
        assert_eq!(report.valid.unwrap().batches, 2);
    }
    assert_eq!(model.steps, 4);

    let logged: Vec<EpochReport> = read_jsonl(&config.metrics_path()).unwrap();
    assert_eq!(logged.len(), 2);
    assert_eq!(logged[1].epoch, 2);

    let mut classifier = MockModel::new(MockPolicy::Fixed(2), 7);
    let answers = predict(&mut classifier, &data.inference, config.training.batch_size).unwrap();
    assert_eq!(answers, vec!["red", "red", "red"]);
    assert_eq!(classifier.modes, vec![Mode::Eval]);

    write_predictions(&config.predictions_path(), &answers, config.output.pretty).unwrap();
    assert_eq!(read_predictions(&config.predictions_path()).unwrap(), answers);
    assert!(tmp.path().join("submission.json").exists());
}

#[test]
fn test_answer_vocabulary_sidecar_round_trips() {
    let (_tmp, config, data) = prepare();

    data.save_answer_vocabulary(&config.vocabulary_path())
        .unwrap();
    let loaded = Vocabulary::load(&config.vocabulary_path()).unwrap();
    assert_eq!(&loaded, &**data.annotated.answer_index());
    assert_eq!(
        loaded.content_hash(),
        data.annotated.answer_index().content_hash()
    );
}

#[test]
fn test_unseen_answer_is_a_coverage_error() {
    let (_tmp, _config, data) = prepare();

    let mut held_out = SampleStore::from_samples(
        vec![RawSample {
            image: "x.jpg".to_string(),
            question: "What color?".to_string(),
            answers: Some(
                ["purple"; 10]
                    .iter()
                    .map(|a| AnswerRecord {
                        answer: a.to_string(),
                    })
                    .collect(),
            ),
        }],
        Path::new("images"),
        StoreMode::Annotated,
        10,
    )
    .unwrap();
    held_out.propagate_from(&data.annotated).unwrap();

    match held_out.get(0) {
        Err(DataError::Vocabulary(VocabularyError::Coverage { word, .. })) => {
            assert_eq!(word, "purple")
        }
        other => panic!("expected coverage error, got {other:?}"),
    }
}

#[test]
fn test_wrong_answer_count_fails_at_load() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("short.json");
    let records = serde_json::Value::Array(vec![record("a.jpg", "q", &["yes"; 3])]);
    std::fs::write(&path, records.to_string()).unwrap();

    let err = SampleStore::load(&path, tmp.path(), StoreMode::Annotated, 10).unwrap_err();
    match err {
        DataError::AnswerCount {
            path: p,
            index,
            expected,
            actual,
        } => {
            assert_eq!(p, path);
            assert_eq!((index, expected, actual), (0, 10, 3));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_malformed_file_fails_at_load() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = SampleStore::load(&path, tmp.path(), StoreMode::Inference, 10).unwrap_err();
    assert!(matches!(err, DataError::Malformed { .. }));
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, "[training]\nepochs = 0\n").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
    assert!(err.to_string().contains("training.epochs"));
}
