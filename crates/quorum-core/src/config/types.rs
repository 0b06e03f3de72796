//! Sub-configuration structs with defaults matching the reference training run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Input record files and image directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Annotated records used for the vocabulary, training and validation
    pub train_path: PathBuf,

    /// Directory the annotated records' image refs resolve against
    pub train_image_dir: PathBuf,

    /// Inference records to predict on
    pub test_path: PathBuf,

    /// Directory the inference records' image refs resolve against
    pub test_image_dir: PathBuf,

    /// Annotator answers every annotated record must carry
    pub answers_per_sample: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            train_path: PathBuf::from("./data/train.json"),
            train_image_dir: PathBuf::from("./data/train"),
            test_path: PathBuf::from("./data/valid.json"),
            test_image_dir: PathBuf::from("./data/valid"),
            answers_per_sample: 10,
        }
    }
}

/// Train/validation partition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Share of records assigned to training, exclusive bounds 0 and 1
    pub train_fraction: f64,

    /// "contiguous" or "shuffled"
    pub policy: String,

    /// Seed for the shuffled policy
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            policy: "contiguous".to_string(),
            seed: 42,
        }
    }
}

/// Epoch loop settings.
///
/// `learning_rate` and `weight_decay` are not read by the core; they are
/// carried so a model implementation can be built from the same file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Full passes over the training partition
    pub epochs: usize,

    /// Samples per batch
    pub batch_size: usize,

    /// Optimizer learning rate
    pub learning_rate: f64,

    /// Optimizer weight decay
    pub weight_decay: f64,

    /// Seed for per-epoch batch shuffling
    pub seed: u64,

    /// Reshuffle training batches every epoch
    pub shuffle_batches: bool,

    /// Show an indicatif progress bar per pass
    pub progress_bar: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            batch_size: 128,
            learning_rate: 0.0005,
            weight_decay: 1e-5,
            seed: 42,
            shuffle_batches: true,
            progress_bar: true,
        }
    }
}

/// Text normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// "substring" (compatible) or "word_boundary"
    pub replacement: String,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            replacement: "substring".to_string(),
        }
    }
}

/// Output artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Flat JSON array of predicted answers
    pub predictions_path: PathBuf,

    /// One JSON line per epoch report
    pub metrics_path: PathBuf,

    /// Frozen answer vocabulary sidecar
    pub vocabulary_path: PathBuf,

    /// Pretty-print JSON output
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            predictions_path: PathBuf::from("submission.json"),
            metrics_path: PathBuf::from("metrics.jsonl"),
            vocabulary_path: PathBuf::from("answer_vocab.json"),
            pretty: false,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,

    /// Log format (pretty, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
