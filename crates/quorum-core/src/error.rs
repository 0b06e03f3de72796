//! Error types for the quorum evaluation core.
//!
//! Errors are grouped by concern so callers can tell a malformed input file
//! apart from a vocabulary coverage gap or a caller mistake. Failures raised
//! by the external model are never wrapped in these types; see
//! [`EpochError`] for how they travel through an epoch.

use std::path::PathBuf;
use thiserror::Error;

use crate::vocabulary::IndexingMode;

/// Top-level error type for quorum operations.
#[derive(Error, Debug)]
pub enum QuorumError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed or inconsistent input data
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Frozen vocabulary violations
    #[error("Vocabulary error: {0}")]
    Vocabulary(#[from] VocabularyError),

    /// Caller passed an argument that cannot produce a result
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Load-time data errors. None of these are recoverable locally.
#[derive(Error, Debug)]
pub enum DataError {
    /// The record file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record file is not a JSON array of well-formed records
    #[error("Malformed records in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An annotated record is missing its `answers` field
    #[error("Record {index} in {path} has no answers")]
    MissingAnswers { path: PathBuf, index: usize },

    /// An annotated record carries the wrong number of answers
    #[error("Record {index} in {path} has {actual} answers, expected {expected}")]
    AnswerCount {
        path: PathBuf,
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Sample index past the end of the store
    #[error("Sample index {index} out of range (store holds {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Vocabulary lookup failed while deriving a sample
    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),
}

/// Violations of the build-once, freeze, propagate protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VocabularyError {
    /// A normalized word was never seen while the vocabulary was built
    #[error("{kind} vocabulary has no entry for {word:?}")]
    Coverage { kind: IndexingMode, word: String },

    /// An id has no word in the vocabulary
    #[error("{kind} vocabulary has no id {id}")]
    UnknownId { kind: IndexingMode, id: u32 },

    /// The store already owns a frozen vocabulary
    #[error("Vocabularies are already built for this store")]
    AlreadyBuilt,

    /// The store has no vocabulary yet
    #[error("Vocabularies have not been built or propagated")]
    NotBuilt,

    /// Samples were derived before propagation; ids would be unstable
    #[error("Cannot replace vocabularies after samples have been derived")]
    AlreadyServed,
}

/// Failures of the external feature encoders.
#[derive(Error, Debug)]
pub enum EncoderError {
    /// The image encoder could not produce a vector
    #[error("Image encoding failed for {path}: {message}")]
    Image { path: PathBuf, message: String },

    /// The text encoder could not produce a vector
    #[error("Text encoding failed for {question:?}: {message}")]
    Text { question: String, message: String },

    /// The sample could not be located in its store
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Error returned by one pass of the epoch runner.
///
/// Model failures are carried unchanged in [`EpochError::Model`].
#[derive(Error, Debug)]
pub enum EpochError<E: std::error::Error + 'static> {
    /// Failure raised by the external model, criterion or optimizer
    #[error(transparent)]
    Model(E),

    /// The batch stream failed while producing a batch
    #[error("Batch production failed: {0}")]
    Data(#[from] DataError),

    /// Metric computation rejected its inputs
    #[error("Scoring failed: {0}")]
    Scoring(QuorumError),

    /// The pass cannot produce metrics (for example no batches at all)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A completed epoch could not be recorded
    #[error("Failed to record epoch: {0}")]
    Report(QuorumError),
}

/// Convenience type alias for quorum results.
pub type Result<T> = std::result::Result<T, QuorumError>;

/// Convenience type alias for data-loading results.
pub type DataResult<T> = std::result::Result<T, DataError>;
