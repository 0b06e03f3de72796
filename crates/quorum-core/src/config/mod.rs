//! Configuration management for quorum.
//!
//! Configuration is loaded from `~/.config/quorum/config.toml` (or the
//! platform equivalent) with defaults taken from the reference training run.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use crate::normalize::{Normalizer, ReplacementMode};
use crate::split::SplitPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input files
    pub data: DataConfig,

    /// Train/validation partition
    pub split: SplitConfig,

    /// Epoch loop
    pub training: TrainingConfig,

    /// Text normalization
    pub normalize: NormalizeConfig,

    /// Output artifacts
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.quorum.quorum/config.toml
    /// - Linux: ~/.config/quorum/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\quorum\quorum\config\config.toml
    ///
    /// Falls back to ~/.quorum/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "quorum", "quorum")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".quorum").join("config.toml")
            })
    }

    /// Annotated records path with `~` expanded.
    pub fn train_path(&self) -> PathBuf {
        expand(&self.data.train_path)
    }

    /// Annotated image directory with `~` expanded.
    pub fn train_image_dir(&self) -> PathBuf {
        expand(&self.data.train_image_dir)
    }

    /// Inference records path with `~` expanded.
    pub fn test_path(&self) -> PathBuf {
        expand(&self.data.test_path)
    }

    /// Inference image directory with `~` expanded.
    pub fn test_image_dir(&self) -> PathBuf {
        expand(&self.data.test_image_dir)
    }

    /// Predictions file with `~` expanded.
    pub fn predictions_path(&self) -> PathBuf {
        expand(&self.output.predictions_path)
    }

    /// Epoch metrics log with `~` expanded.
    pub fn metrics_path(&self) -> PathBuf {
        expand(&self.output.metrics_path)
    }

    /// Answer vocabulary sidecar with `~` expanded.
    pub fn vocabulary_path(&self) -> PathBuf {
        expand(&self.output.vocabulary_path)
    }

    /// Configured partition strategy.
    ///
    /// Unknown spellings are rejected by validation; an unvalidated config
    /// falls back to contiguous.
    pub fn split_policy(&self) -> SplitPolicy {
        match self.split.policy.to_lowercase().as_str() {
            "shuffled" => SplitPolicy::Shuffled {
                seed: self.split.seed,
            },
            _ => SplitPolicy::Contiguous,
        }
    }

    /// Normalizer with the configured replacement mode.
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(ReplacementMode::parse(&self.normalize.replacement).unwrap_or_default())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}
