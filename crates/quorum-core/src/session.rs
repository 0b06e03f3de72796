//! Multi-epoch training and inference over prepared stores.
//!
//! [`PreparedData`] wires the stores together: the annotated file builds the
//! vocabularies, is split into training and validation positions, and hands
//! its frozen vocabularies to the inference file. [`TrainingSession`] then
//! alternates a training pass and a validation pass per epoch, and
//! [`predict`] maps the model's argmax ids back to answer strings.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use indicatif::ProgressBar;

use crate::batch::{BatchIter, Batcher};
use crate::config::Config;
use crate::dataset::{SampleStore, StoreMode};
use crate::error::{DataError, EpochError, Result, VocabularyError};
use crate::math::argmax_rows;
use crate::metrics::{estimate_completion, format_estimate, EpochMetrics, EpochReport};
use crate::model::{Mode, VqaModel};
use crate::output::MetricsLog;
use crate::runner::{create_progress_bar, EpochRunner};
use crate::split::{split_indices, Split};

/// The annotated store split for training, plus the propagated inference store.
#[derive(Debug)]
pub struct PreparedData {
    pub annotated: SampleStore,
    pub split: Split,
    pub inference: SampleStore,
}

impl PreparedData {
    /// Load both record files named in `config` and index them.
    pub fn from_config(config: &Config) -> Result<Self> {
        let normalizer = config.normalizer();

        let mut annotated = SampleStore::load(
            &config.train_path(),
            &config.train_image_dir(),
            StoreMode::Annotated,
            config.data.answers_per_sample,
        )?
        .with_normalizer(normalizer);
        annotated.build_vocabularies()?;
        tracing::info!(
            "Built vocabularies: {} question tokens, {} answers",
            annotated.question_index().len(),
            annotated.answer_index().len()
        );

        let split = split_indices(
            annotated.len(),
            config.split.train_fraction,
            config.split_policy(),
        )?;

        let mut inference = SampleStore::load(
            &config.test_path(),
            &config.test_image_dir(),
            StoreMode::Inference,
            config.data.answers_per_sample,
        )?;
        inference.propagate_from(&annotated)?;

        Ok(Self {
            annotated,
            split,
            inference,
        })
    }

    /// Persist the frozen answer vocabulary so predicted ids can be decoded later.
    pub fn save_answer_vocabulary(&self, path: &Path) -> Result<()> {
        let vocabulary = self.annotated.answer_index();
        vocabulary.save(path)?;
        tracing::info!(
            path = %path.display(),
            hash = %vocabulary.content_hash(),
            "Answer vocabulary saved"
        );
        Ok(())
    }
}

/// Settings of a multi-epoch run.
#[derive(Debug, Clone)]
pub struct TrainingSession {
    epochs: usize,
    batch_size: usize,
    shuffle_seed: Option<u64>,
    progress: bool,
    metrics_path: Option<PathBuf>,
}

impl TrainingSession {
    /// A session without shuffling, progress bars or metrics file.
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        Self {
            epochs,
            batch_size,
            shuffle_seed: None,
            progress: false,
            metrics_path: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut session = Self::new(config.training.epochs, config.training.batch_size)
            .with_progress(config.training.progress_bar)
            .with_metrics_log(config.metrics_path());
        if config.training.shuffle_batches {
            session = session.with_shuffle(config.training.seed);
        }
        session
    }

    /// Reshuffle training batches every epoch.
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Append every epoch report to `path` as JSON Lines.
    pub fn with_metrics_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.metrics_path = Some(path.into());
        self
    }

    /// Train on `split.train` and validate on `split.valid` for every epoch.
    ///
    /// Validation is skipped when `split.valid` is empty. The first failing
    /// pass aborts the run; reports of earlier epochs are already logged and
    /// appended to the metrics file.
    pub fn run<M: VqaModel>(
        &self,
        model: &mut M,
        store: &SampleStore,
        split: &Split,
    ) -> std::result::Result<Vec<EpochReport>, EpochError<M::Error>> {
        if self.epochs == 0 {
            return Err(EpochError::InvalidArgument(
                "a session needs at least one epoch".to_string(),
            ));
        }

        let mut train = Batcher::new(store, split.train.clone(), self.batch_size)
            .map_err(|e| EpochError::InvalidArgument(e.to_string()))?;
        if let Some(seed) = self.shuffle_seed {
            train = train.with_shuffle(seed);
        }
        let valid = if split.valid.is_empty() {
            None
        } else {
            Some(
                Batcher::new(store, split.valid.clone(), self.batch_size)
                    .map_err(|e| EpochError::InvalidArgument(e.to_string()))?,
            )
        };

        let mut log = match &self.metrics_path {
            Some(path) => Some(MetricsLog::open(path).map_err(EpochError::Report)?),
            None => None,
        };

        tracing::info!(
            "Training {} epochs: {} train batches, {} valid batches per epoch",
            self.epochs,
            train.num_batches(),
            valid.as_ref().map_or(0, |v| v.num_batches())
        );

        let started_at = Local::now();
        let clock = Instant::now();
        let mut reports = Vec::with_capacity(self.epochs);

        for epoch in 0..self.epochs {
            let train_metrics = self.pass(
                model,
                train.epoch(epoch),
                train.num_batches(),
                Mode::Train,
            )?;
            let valid_metrics = match &valid {
                Some(v) => Some(self.pass(model, v.epoch(0), v.num_batches(), Mode::Eval)?),
                None => None,
            };

            let estimated = estimate_completion(started_at, clock.elapsed(), epoch, self.epochs);
            let report = EpochReport {
                epoch: epoch + 1,
                total_epochs: self.epochs,
                train: train_metrics,
                valid: valid_metrics,
                estimated_end: format_estimate(&estimated),
            };
            tracing::info!("{}", report);

            if let Some(log) = log.as_mut() {
                log.append(&report).map_err(EpochError::Report)?;
            }
            reports.push(report);
        }

        Ok(reports)
    }

    fn pass<M: VqaModel>(
        &self,
        model: &mut M,
        batches: BatchIter<'_>,
        total: usize,
        mode: Mode,
    ) -> std::result::Result<EpochMetrics, EpochError<M::Error>> {
        let bar = if self.progress {
            create_progress_bar(total as u64, &mode.to_string())
        } else {
            ProgressBar::hidden()
        };
        EpochRunner::new().with_progress(bar).run(model, batches, mode)
    }
}

/// Predict one answer string per sample of `store`, in input order.
///
/// The model runs in evaluation mode. Ids outside the answer vocabulary
/// fail with [`VocabularyError::UnknownId`].
pub fn predict<M: VqaModel>(
    model: &mut M,
    store: &SampleStore,
    batch_size: usize,
) -> std::result::Result<Vec<String>, EpochError<M::Error>> {
    if !store.is_indexed() {
        return Err(EpochError::Data(VocabularyError::NotBuilt.into()));
    }
    let batcher = Batcher::sequential(store, batch_size)
        .map_err(|e| EpochError::InvalidArgument(e.to_string()))?;
    let vocabulary = store.answer_index();

    model.set_mode(Mode::Eval);
    let mut answers = Vec::with_capacity(store.len());
    for batch in batcher.epoch(0) {
        let batch = batch?;
        let logits = model.forward(&batch).map_err(EpochError::Model)?;
        if logits.len() != batch.len() {
            return Err(EpochError::InvalidArgument(format!(
                "model returned {} rows for a batch of {}",
                logits.len(),
                batch.len()
            )));
        }
        let ids = argmax_rows(&logits).map_err(|row| {
            EpochError::InvalidArgument(format!("logits row {} has no finite maximum", row))
        })?;
        for id in ids {
            let word = vocabulary
                .resolve(id)
                .map_err(|e| EpochError::Data(DataError::Vocabulary(e)))?;
            answers.push(word.to_string());
        }
    }

    tracing::info!("Predicted {} answers", answers.len());
    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{AnswerRecord, RawSample};
    use crate::mocks::{MockModel, MockPolicy};
    use crate::output::read_jsonl;

    fn annotated(answers: &[&str]) -> RawSample {
        RawSample {
            image: "img.jpg".to_string(),
            question: "What color is it?".to_string(),
            answers: Some(
                answers
                    .iter()
                    .map(|a| AnswerRecord {
                        answer: a.to_string(),
                    })
                    .collect(),
            ),
        }
    }

    fn store() -> SampleStore {
        let samples = vec![
            annotated(&["red"; 10]),
            annotated(&["blue"; 10]),
            annotated(&["red"; 10]),
            annotated(&["green"; 10]),
        ];
        let mut store =
            SampleStore::from_samples(samples, Path::new("imgs"), StoreMode::Annotated, 10)
                .unwrap();
        store.build_vocabularies().unwrap();
        store
    }

    #[test]
    fn test_session_reports_every_epoch() {
        let store = store();
        let split = Split {
            train: vec![0, 1, 2],
            valid: vec![3],
        };
        let mut model = MockModel::new(MockPolicy::Consensus, 3);

        let reports = TrainingSession::new(3, 2)
            .with_shuffle(7)
            .run(&mut model, &store, &split)
            .unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[2].epoch, 3);
        assert_eq!(reports[0].train.batches, 2);
        assert_eq!(reports[0].valid.unwrap().batches, 1);
        assert!((reports[0].train.mean_simple_accuracy - 1.0).abs() < 1e-12);
        // train then eval, every epoch
        assert_eq!(
            model.modes,
            vec![
                Mode::Train,
                Mode::Eval,
                Mode::Train,
                Mode::Eval,
                Mode::Train,
                Mode::Eval
            ]
        );
        assert_eq!(model.steps, 6);
    }

    #[test]
    fn test_session_without_validation() {
        let store = store();
        let split = Split {
            train: vec![0, 1, 2, 3],
            valid: vec![],
        };
        let mut model = MockModel::new(MockPolicy::Fixed(0), 3);
        let reports = TrainingSession::new(1, 4)
            .run(&mut model, &store, &split)
            .unwrap();
        assert!(reports[0].valid.is_none());
    }

    #[test]
    fn test_session_writes_metrics_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");
        let store = store();
        let split = Split {
            train: vec![0, 1],
            valid: vec![2, 3],
        };
        let mut model = MockModel::new(MockPolicy::Fixed(0), 3);

        TrainingSession::new(2, 2)
            .with_metrics_log(&path)
            .run(&mut model, &store, &split)
            .unwrap();

        let logged: Vec<EpochReport> = read_jsonl(&path).unwrap();
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0].total_epochs, 2);
    }

    #[test]
    fn test_session_aborts_on_model_failure() {
        let store = store();
        let split = Split {
            train: vec![0, 1],
            valid: vec![2],
        };
        // Epoch 1 uses forward calls 0 (train) and 1 (valid); call 2 fails.
        let mut model = MockModel::new(MockPolicy::Fixed(0), 3).failing_at(2);
        let err = TrainingSession::new(3, 2)
            .run(&mut model, &store, &split)
            .unwrap_err();
        assert!(matches!(err, EpochError::Model(_)));
    }

    #[test]
    fn test_zero_epochs_rejected() {
        let store = store();
        let split = Split {
            train: vec![0],
            valid: vec![1],
        };
        let mut model = MockModel::new(MockPolicy::Fixed(0), 3);
        let err = TrainingSession::new(0, 2)
            .run(&mut model, &store, &split)
            .unwrap_err();
        assert!(matches!(err, EpochError::InvalidArgument(_)));
    }

    #[test]
    fn test_predict_maps_ids_to_answers() {
        let train = store();
        let mut test = SampleStore::from_samples(
            vec![
                RawSample {
                    image: "a.jpg".to_string(),
                    question: "q1".to_string(),
                    answers: None,
                },
                RawSample {
                    image: "b.jpg".to_string(),
                    question: "q2".to_string(),
                    answers: None,
                },
            ],
            Path::new("test"),
            StoreMode::Inference,
            10,
        )
        .unwrap();
        test.propagate_from(&train).unwrap();

        // ids follow first-seen order: red=0, blue=1, green=2
        let mut model = MockModel::new(MockPolicy::Fixed(1), 3);
        let answers = predict(&mut model, &test, 1).unwrap();
        assert_eq!(answers, vec!["blue".to_string(), "blue".to_string()]);
        assert_eq!(model.modes, vec![Mode::Eval]);
        assert_eq!(model.steps, 0);
    }

    #[test]
    fn test_predict_rejects_unknown_id() {
        let train = store();
        let mut test = SampleStore::from_samples(
            vec![RawSample {
                image: "a.jpg".to_string(),
                question: "q".to_string(),
                answers: None,
            }],
            Path::new("test"),
            StoreMode::Inference,
            10,
        )
        .unwrap();
        test.propagate_from(&train).unwrap();

        let mut model = MockModel::new(MockPolicy::Fixed(9), 10);
        let err = predict(&mut model, &test, 4).unwrap_err();
        assert!(matches!(
            err,
            EpochError::Data(DataError::Vocabulary(VocabularyError::UnknownId { id: 9, .. }))
        ));
    }

    #[test]
    fn test_predict_rejects_rows_without_maximum() {
        let train = store();
        let mut test = SampleStore::from_samples(
            vec![RawSample {
                image: "a.jpg".to_string(),
                question: "q".to_string(),
                answers: None,
            }],
            Path::new("test"),
            StoreMode::Inference,
            10,
        )
        .unwrap();
        test.propagate_from(&train).unwrap();

        let mut model = MockModel::new(MockPolicy::Fixed(0), 3).with_nan_logits();
        let err = predict(&mut model, &test, 4).unwrap_err();
        match err {
            EpochError::InvalidArgument(msg) => assert!(msg.contains("row 0")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_config_expands_metrics_path() {
        let config = Config::from_toml("[output]\nmetrics_path = \"~/runs/metrics.jsonl\"\n")
            .unwrap();
        let session = TrainingSession::from_config(&config);
        let path = session.metrics_path.unwrap();
        assert!(!path.starts_with("~"));
        assert!(path.ends_with("runs/metrics.jsonl"));
    }

    #[test]
    fn test_predict_requires_vocabulary() {
        let test = SampleStore::from_samples(
            vec![RawSample {
                image: "a.jpg".to_string(),
                question: "q".to_string(),
                answers: None,
            }],
            Path::new("test"),
            StoreMode::Inference,
            10,
        )
        .unwrap();
        let mut model = MockModel::new(MockPolicy::Fixed(0), 1);
        assert!(predict(&mut model, &test, 4).is_err());
    }
}
