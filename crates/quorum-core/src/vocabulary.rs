//! Word to id vocabularies built once from the training records.
//!
//! Construction is two-phase. A [`VocabularyBuilder`] accepts words in
//! corpus order and hands out ids first-seen-wins; [`VocabularyBuilder::freeze`]
//! turns it into an immutable [`Vocabulary`] that is shared behind an `Arc`.
//! There is no way back from a frozen vocabulary to a builder.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::RawSample;
use crate::error::{QuorumError, VocabularyError};
use crate::normalize::Normalizer;

/// What a vocabulary indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingMode {
    /// Whitespace-separated tokens of normalized questions
    QuestionTokens,
    /// Whole normalized answer strings, never tokenized
    AnswerPhrases,
}

impl fmt::Display for IndexingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexingMode::QuestionTokens => write!(f, "question"),
            IndexingMode::AnswerPhrases => write!(f, "answer"),
        }
    }
}

/// Mutable half of the two-phase protocol. Only lives during a build.
#[derive(Debug)]
pub struct VocabularyBuilder {
    kind: IndexingMode,
    words: Vec<String>,
    ids: HashMap<String, u32>,
}

impl VocabularyBuilder {
    /// Start an empty builder.
    pub fn new(kind: IndexingMode) -> Self {
        Self {
            kind,
            words: Vec::new(),
            ids: HashMap::new(),
        }
    }

    /// Insert a word, returning its id. Existing words keep their first id.
    pub fn insert(&mut self, word: &str) -> u32 {
        if let Some(&id) = self.ids.get(word) {
            return id;
        }
        let id = self.words.len() as u32;
        self.words.push(word.to_string());
        self.ids.insert(word.to_string(), id);
        id
    }

    /// Number of distinct words inserted so far.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Finish the build. The result can no longer grow.
    pub fn freeze(self) -> Vocabulary {
        Vocabulary {
            kind: self.kind,
            words: self.words,
            ids: self.ids,
        }
    }
}

/// A frozen, bidirectional word/id mapping.
///
/// `words[id]` is the inverse of `ids[word]` for every entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    kind: IndexingMode,
    words: Vec<String>,
    ids: HashMap<String, u32>,
}

/// On-disk form: ids are implied by position.
#[derive(Serialize, Deserialize)]
struct VocabularyFile {
    kind: IndexingMode,
    words: Vec<String>,
}

impl Vocabulary {
    /// An empty vocabulary, the default state of an unindexed store.
    pub fn empty(kind: IndexingMode) -> Self {
        VocabularyBuilder::new(kind).freeze()
    }

    /// Build a frozen vocabulary from raw records.
    ///
    /// Question mode splits each normalized question on single spaces;
    /// answer mode indexes each normalized answer as one phrase. Records
    /// without answers contribute nothing in answer mode.
    pub fn build_from(samples: &[RawSample], kind: IndexingMode, normalizer: &Normalizer) -> Self {
        let mut builder = VocabularyBuilder::new(kind);

        match kind {
            IndexingMode::QuestionTokens => {
                for sample in samples {
                    let question = normalizer.normalize(&sample.question);
                    for token in question.split(' ') {
                        builder.insert(token);
                    }
                }
            }
            IndexingMode::AnswerPhrases => {
                for answers in samples.iter().filter_map(|s| s.answers.as_ref()) {
                    for answer in answers {
                        builder.insert(&normalizer.normalize(&answer.answer));
                    }
                }
            }
        }

        let vocabulary = builder.freeze();
        if vocabulary.is_empty() {
            tracing::warn!(
                "{} vocabulary is empty after {} records; every lookup will fail",
                kind,
                samples.len()
            );
        }
        tracing::info!(
            "Built {} vocabulary: {} entries from {} records",
            kind,
            vocabulary.len(),
            samples.len()
        );
        vocabulary
    }

    /// What this vocabulary indexes.
    pub fn kind(&self) -> IndexingMode {
        self.kind
    }

    /// Id of a word, if present.
    pub fn id(&self, word: &str) -> Option<u32> {
        self.ids.get(word).copied()
    }

    /// Word for an id, if present.
    pub fn word(&self, id: u32) -> Option<&str> {
        self.words.get(id as usize).map(String::as_str)
    }

    /// Id of a word, or a coverage error naming it.
    pub fn lookup(&self, word: &str) -> Result<u32, VocabularyError> {
        self.id(word).ok_or_else(|| VocabularyError::Coverage {
            kind: self.kind,
            word: word.to_string(),
        })
    }

    /// Word for an id, or an error if the id was never assigned.
    pub fn resolve(&self, id: u32) -> Result<&str, VocabularyError> {
        self.word(id)
            .ok_or(VocabularyError::UnknownId { kind: self.kind, id })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Iterate `(id, word)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.words
            .iter()
            .enumerate()
            .map(|(id, word)| (id as u32, word.as_str()))
    }

    /// Multi-hot encoding of an already-normalized question.
    ///
    /// Length is `len() + 1`; the last slot is set when any token is unknown.
    pub fn bag_of_words(&self, normalized: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.len() + 1];
        for token in normalized.split(' ') {
            match self.id(token) {
                Some(id) => vector[id as usize] = 1.0,
                None => vector[self.len()] = 1.0,
            }
        }
        vector
    }

    /// BLAKE3 hash of the kind and every word in id order.
    ///
    /// Two vocabularies with equal hashes assign the same ids.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.kind.to_string().as_bytes());
        hasher.update(b"\n");
        for word in &self.words {
            hasher.update(word.as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Save the vocabulary as JSON.
    pub fn save(&self, path: &Path) -> Result<(), QuorumError> {
        let file = VocabularyFile {
            kind: self.kind,
            words: self.words.clone(),
        };
        std::fs::write(path, serde_json::to_string(&file)?)?;
        tracing::info!(
            "Saved {} vocabulary ({} entries) to {:?}",
            self.kind,
            self.len(),
            path
        );
        Ok(())
    }

    /// Load a vocabulary written by [`Vocabulary::save`].
    ///
    /// A file listing the same word twice is rejected.
    pub fn load(path: &Path) -> Result<Self, QuorumError> {
        let content = std::fs::read_to_string(path)?;
        let file: VocabularyFile = serde_json::from_str(&content)?;

        let mut builder = VocabularyBuilder::new(file.kind);
        for word in &file.words {
            builder.insert(word);
        }
        if builder.len() != file.words.len() {
            return Err(QuorumError::InvalidArgument(format!(
                "Vocabulary file {:?} contains duplicate words",
                path
            )));
        }

        tracing::debug!("Loaded {} vocabulary from {:?}", file.kind, path);
        Ok(builder.freeze())
    }
}
