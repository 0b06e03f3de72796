//! Quorum Core - consensus evaluation for visual question answering.
//!
//! Quorum is the data side of a VQA training run: it canonicalizes free-form
//! answers, indexes them against a frozen training vocabulary, and scores
//! predictions against ten human annotations with the leave-one-out
//! consensus metric. Image and text encoders and the classifier itself are
//! external; they plug in through the traits in [`model`].
//!
//! # Architecture
//!
//! ```text
//! JSON records → Normalize → Vocabulary (frozen) → SampleStore → Batcher
//!                                                        ↓
//!                     EpochReport ← Scoring ← EpochRunner (VqaModel)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use quorum_core::{predict, Config, PreparedData, TrainingSession};
//!
//! let config = Config::load()?;
//! let data = PreparedData::from_config(&config)?;
//! let mut model = MyModel::new(data.annotated.answer_index().len());
//!
//! TrainingSession::from_config(&config).run(&mut model, &data.annotated, &data.split)?;
//! let answers = predict(&mut model, &data.inference, config.training.batch_size)?;
//! quorum_core::output::write_predictions(&config.predictions_path(), &answers, false)?;
//! ```

// Module declarations
pub mod batch;
pub mod config;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod math;
pub mod metrics;
pub mod mocks;
pub mod model;
pub mod normalize;
pub mod output;
pub mod runner;
pub mod scoring;
pub mod session;
pub mod split;
pub mod vocabulary;

// Re-exports for convenient access
pub use batch::{Batch, Batcher};
pub use config::Config;
pub use dataset::{IndexedSample, RawSample, SampleStore, StoreMode};
pub use error::{
    ConfigError, DataError, DataResult, EncoderError, EpochError, QuorumError, Result,
    VocabularyError,
};
pub use metrics::{EpochMetrics, EpochReport};
pub use model::{ImageEncoder, Mode, TextEncoder, VqaModel};
pub use normalize::{normalize, Normalizer, ReplacementMode};
pub use output::{OutputFormat, OutputWriter};
pub use runner::{EpochRunner, RunnerState};
pub use scoring::{batch_consensus_score, consensus_score, simple_accuracy};
pub use session::{predict, PreparedData, TrainingSession};
pub use split::{split_indices, Split, SplitPolicy};
pub use vocabulary::{IndexingMode, Vocabulary, VocabularyBuilder};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
