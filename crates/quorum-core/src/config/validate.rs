//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::normalize::ReplacementMode;

use super::Config;

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];
const SPLIT_POLICIES: &[&str] = &["contiguous", "shuffled"];

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.data.answers_per_sample == 0 {
            return Err(ConfigError::ValidationError(
                "data.answers_per_sample must be > 0".into(),
            ));
        }
        let fraction = self.split.train_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ConfigError::ValidationError(
                "split.train_fraction must be strictly between 0.0 and 1.0".into(),
            ));
        }
        if !SPLIT_POLICIES.contains(&self.split.policy.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "split.policy must be one of {:?}, got {:?}",
                SPLIT_POLICIES, self.split.policy
            )));
        }
        if self.training.epochs == 0 {
            return Err(ConfigError::ValidationError(
                "training.epochs must be > 0".into(),
            ));
        }
        if self.training.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "training.batch_size must be > 0".into(),
            ));
        }
        if self.training.learning_rate <= 0.0 {
            return Err(ConfigError::ValidationError(
                "training.learning_rate must be > 0".into(),
            ));
        }
        if self.training.weight_decay < 0.0 {
            return Err(ConfigError::ValidationError(
                "training.weight_decay must be >= 0".into(),
            ));
        }
        if ReplacementMode::parse(&self.normalize.replacement).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "normalize.replacement must be \"substring\" or \"word_boundary\", got {:?}",
                self.normalize.replacement
            )));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {:?}, got {:?}",
                LOG_LEVELS, self.logging.level
            )));
        }
        if !LOG_FORMATS.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be one of {:?}, got {:?}",
                LOG_FORMATS, self.logging.format
            )));
        }
        Ok(())
    }
}
