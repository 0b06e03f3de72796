//! Annotated sample store.
//!
//! Holds the raw records of one JSON file and derives indexed samples on
//! access. A store starts unindexed; it becomes indexed either by building
//! its own vocabularies (the training file) or by adopting another store's
//! vocabularies (validation and test files). Indices are shared through
//! `Arc`, so a propagated store points at the very same frozen vocabulary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult, VocabularyError};
use crate::normalize::Normalizer;
use crate::vocabulary::{IndexingMode, Vocabulary};

/// One annotator's answer as it appears in the input file.
///
/// Fields other than `answer` (confidence flags and the like) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub answer: String,
}

/// A record exactly as loaded. Immutable once the store owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    /// Image path relative to the store's image directory
    pub image: String,

    /// Free-form question text
    pub question: String,

    /// Annotator answers, absent for inference-only files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<AnswerRecord>>,
}

/// Whether a store carries ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Every record has a full set of annotator answers
    Annotated,
    /// Records carry only an image and a question
    Inference,
}

/// Answer ids of one annotated sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerLabels {
    /// One id per annotator, parallel to the raw answers
    pub answer_ids: Vec<u32>,

    /// Most frequent id in `answer_ids`, smallest id on ties
    pub consensus_id: u32,
}

/// A sample as delivered downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedSample {
    /// Position in the store
    pub index: usize,

    /// Image path relative to the store's image directory
    pub image_ref: String,

    /// Question text as loaded
    pub question: String,

    /// Question after normalization
    pub normalized_question: String,

    /// Ground truth, present only for annotated stores
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<AnswerLabels>,
}

/// Most frequent id, with the numerically smallest id winning ties.
///
/// Returns `None` for an empty slice.
pub fn majority_vote(ids: &[u32]) -> Option<u32> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for &id in ids {
        *counts.entry(id).or_insert(0) += 1;
    }

    // Ascending id order; only a strictly higher count replaces the leader.
    counts
        .into_iter()
        .fold(None, |best: Option<(u32, usize)>, (id, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((id, count)),
        })
        .map(|(id, _)| id)
}

/// Records of one input file plus the vocabularies used to index them.
#[derive(Debug)]
pub struct SampleStore {
    samples: Vec<RawSample>,
    image_dir: PathBuf,
    mode: StoreMode,
    normalizer: Normalizer,
    question_index: Arc<Vocabulary>,
    answer_index: Arc<Vocabulary>,
    indexed: bool,
    served: AtomicBool,
}

impl SampleStore {
    /// Load records from a JSON array file.
    ///
    /// In [`StoreMode::Annotated`] every record must carry exactly
    /// `answers_per_sample` answers. In [`StoreMode::Inference`] any answers
    /// present in the file are dropped.
    pub fn load(
        path: &Path,
        image_dir: &Path,
        mode: StoreMode,
        answers_per_sample: usize,
    ) -> DataResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| DataError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let samples: Vec<RawSample> =
            serde_json::from_str(&content).map_err(|source| DataError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        let store = Self::from_samples(samples, image_dir, mode, answers_per_sample)
            .map_err(|e| with_path(e, path))?;

        tracing::info!(
            "Loaded {} records from {:?} ({:?})",
            store.len(),
            path,
            mode
        );
        Ok(store)
    }

    /// Build a store from records already in memory.
    pub fn from_samples(
        mut samples: Vec<RawSample>,
        image_dir: &Path,
        mode: StoreMode,
        answers_per_sample: usize,
    ) -> DataResult<Self> {
        match mode {
            StoreMode::Annotated => {
                for (index, sample) in samples.iter().enumerate() {
                    let answers = sample.answers.as_ref().ok_or(DataError::MissingAnswers {
                        path: PathBuf::new(),
                        index,
                    })?;
                    if answers.len() != answers_per_sample {
                        return Err(DataError::AnswerCount {
                            path: PathBuf::new(),
                            index,
                            expected: answers_per_sample,
                            actual: answers.len(),
                        });
                    }
                }
            }
            StoreMode::Inference => {
                for sample in &mut samples {
                    sample.answers = None;
                }
            }
        }

        Ok(Self {
            samples,
            image_dir: image_dir.to_path_buf(),
            mode,
            normalizer: Normalizer::default(),
            question_index: Arc::new(Vocabulary::empty(IndexingMode::QuestionTokens)),
            answer_index: Arc::new(Vocabulary::empty(IndexingMode::AnswerPhrases)),
            indexed: false,
            served: AtomicBool::new(false),
        })
    }

    /// Use a different normalizer. Must be chosen before indexing.
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Build and freeze both vocabularies from this store's records.
    ///
    /// Allowed once per store; a second call fails with `AlreadyBuilt`.
    pub fn build_vocabularies(&mut self) -> Result<(), VocabularyError> {
        if self.indexed {
            return Err(VocabularyError::AlreadyBuilt);
        }

        let questions = Vocabulary::build_from(
            &self.samples,
            IndexingMode::QuestionTokens,
            &self.normalizer,
        );
        let answers =
            Vocabulary::build_from(&self.samples, IndexingMode::AnswerPhrases, &self.normalizer);
        if self.mode == StoreMode::Annotated && answers.len() == 1 && self.samples.len() > 1 {
            tracing::warn!(
                "All {} annotated records share one answer ({:?}); consensus scores will be trivial",
                self.samples.len(),
                answers.word(0).unwrap_or_default()
            );
        }

        self.question_index = Arc::new(questions);
        self.answer_index = Arc::new(answers);
        self.indexed = true;
        Ok(())
    }

    /// Replace this store's vocabularies (and normalizer) with `source`'s.
    ///
    /// Nothing is merged. Fails if `source` is unindexed or if this store
    /// has already handed out samples, since their ids would change.
    pub fn propagate_from(&mut self, source: &SampleStore) -> Result<(), VocabularyError> {
        if !source.indexed {
            return Err(VocabularyError::NotBuilt);
        }
        if self.served.load(Ordering::Acquire) {
            return Err(VocabularyError::AlreadyServed);
        }

        self.question_index = Arc::clone(&source.question_index);
        self.answer_index = Arc::clone(&source.answer_index);
        self.normalizer = source.normalizer;
        self.indexed = true;

        tracing::debug!(
            "Propagated vocabularies ({} question tokens, {} answers)",
            self.question_index.len(),
            self.answer_index.len()
        );
        Ok(())
    }

    /// Derive the indexed form of sample `index`.
    ///
    /// Annotated stores look every normalized answer up in the frozen answer
    /// vocabulary; an answer missing from it is a coverage error, never an
    /// unknown bucket.
    pub fn get(&self, index: usize) -> DataResult<IndexedSample> {
        let sample = self.samples.get(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: self.samples.len(),
        })?;

        let labels = match (self.mode, &sample.answers) {
            (StoreMode::Annotated, Some(answers)) => {
                if !self.indexed {
                    return Err(VocabularyError::NotBuilt.into());
                }
                let answer_ids = answers
                    .iter()
                    .map(|a| self.answer_index.lookup(&self.normalizer.normalize(&a.answer)))
                    .collect::<Result<Vec<u32>, VocabularyError>>()?;
                let consensus_id = majority_vote(&answer_ids).ok_or(DataError::MissingAnswers {
                    path: PathBuf::new(),
                    index,
                })?;
                Some(AnswerLabels {
                    answer_ids,
                    consensus_id,
                })
            }
            _ => None,
        };

        self.served.store(true, Ordering::Release);

        Ok(IndexedSample {
            index,
            image_ref: sample.image.clone(),
            question: sample.question.clone(),
            normalized_question: self.normalizer.normalize(&sample.question),
            labels,
        })
    }

    /// Multi-hot question encoding over the question vocabulary.
    pub fn question_vector(&self, index: usize) -> DataResult<Vec<f32>> {
        let sample = self.raw(index)?;
        if !self.indexed {
            return Err(VocabularyError::NotBuilt.into());
        }
        Ok(self
            .question_index
            .bag_of_words(&self.normalizer.normalize(&sample.question)))
    }

    /// The record at `index` as loaded.
    pub fn raw(&self, index: usize) -> DataResult<&RawSample> {
        self.samples.get(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: self.samples.len(),
        })
    }

    /// Full path of the image for sample `index`.
    pub fn image_path(&self, index: usize) -> DataResult<PathBuf> {
        Ok(self.image_dir.join(&self.raw(index)?.image))
    }

    /// Number of records. Fixed for the store's lifetime.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether this store has ground truth.
    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    /// Whether vocabularies were built or propagated.
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Normalizer applied to questions and answers.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Frozen question-token vocabulary.
    pub fn question_index(&self) -> &Arc<Vocabulary> {
        &self.question_index
    }

    /// Frozen answer-phrase vocabulary.
    pub fn answer_index(&self) -> &Arc<Vocabulary> {
        &self.answer_index
    }
}

fn with_path(error: DataError, path: &Path) -> DataError {
    match error {
        DataError::MissingAnswers { index, .. } => DataError::MissingAnswers {
            path: path.to_path_buf(),
            index,
        },
        DataError::AnswerCount {
            index,
            expected,
            actual,
            ..
        } => DataError::AnswerCount {
            path: path.to_path_buf(),
            index,
            expected,
            actual,
        },
        other => other,
    }
}
