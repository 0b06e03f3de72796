//! Deterministic stand-ins for the external encoders and model.
//!
//! Used by the tests to drive the runner and session without any neural
//! network behind them.

use std::path::Path;

use thiserror::Error;

use crate::batch::Batch;
use crate::error::EncoderError;
use crate::model::{ImageEncoder, Logits, Mode, TextEncoder, VqaModel};

/// Failure injected by the mock model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("mock model failed at batch {batch}")]
pub struct MockModelError {
    pub batch: usize,
}

/// What the mock model predicts for each sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockPolicy {
    /// Always the same answer id
    Fixed(u32),
    /// The sample's consensus id (falls back to 0 when unlabeled)
    Consensus,
}

/// Scripted classifier that records how the runner drove it.
#[derive(Debug, Clone)]
pub struct MockModel {
    policy: MockPolicy,
    num_answers: usize,
    loss: f64,
    fail_at: Option<usize>,
    nan_logits: bool,
    /// Every mode switch, in order
    pub modes: Vec<Mode>,
    /// Number of forward calls
    pub forward_calls: usize,
    /// Number of optimizer steps taken
    pub steps: usize,
}

impl MockModel {
    /// A model over `num_answers` ids with a constant loss of 1.0.
    pub fn new(policy: MockPolicy, num_answers: usize) -> Self {
        Self {
            policy,
            num_answers,
            loss: 1.0,
            fail_at: None,
            nan_logits: false,
            modes: Vec::new(),
            forward_calls: 0,
            steps: 0,
        }
    }

    /// Report `loss` for every batch.
    pub fn with_loss(mut self, loss: f64) -> Self {
        self.loss = loss;
        self
    }

    /// Fail the forward pass of the `batch`-th call (zero-based).
    pub fn failing_at(mut self, batch: usize) -> Self {
        self.fail_at = Some(batch);
        self
    }

    /// Emit rows of NaN instead of one-hot logits.
    pub fn with_nan_logits(mut self) -> Self {
        self.nan_logits = true;
        self
    }

    fn predict(&self, batch: &Batch) -> Vec<u32> {
        batch
            .samples
            .iter()
            .map(|s| match self.policy {
                MockPolicy::Fixed(id) => id,
                MockPolicy::Consensus => s.labels.as_ref().map_or(0, |l| l.consensus_id),
            })
            .collect()
    }
}

impl VqaModel for MockModel {
    type Loss = f64;
    type Error = MockModelError;

    fn set_mode(&mut self, mode: Mode) {
        self.modes.push(mode);
    }

    fn forward(&mut self, batch: &Batch) -> Result<Logits, Self::Error> {
        let call = self.forward_calls;
        self.forward_calls += 1;
        if self.fail_at == Some(call) {
            return Err(MockModelError { batch: call });
        }

        Ok(self
            .predict(batch)
            .into_iter()
            .map(|id| {
                if self.nan_logits {
                    return vec![f32::NAN; self.num_answers];
                }
                let mut row = vec![0.0; self.num_answers.max(id as usize + 1)];
                row[id as usize] = 1.0;
                row
            })
            .collect())
    }

    fn loss(&mut self, _logits: &Logits, _targets: &[u32]) -> Result<f64, Self::Error> {
        Ok(self.loss)
    }

    fn loss_value(&self, loss: &f64) -> f64 {
        *loss
    }

    fn optimize(&mut self, _loss: f64) -> Result<(), Self::Error> {
        self.steps += 1;
        Ok(())
    }
}

/// Image encoder returning the same vector for every image.
#[derive(Debug, Clone)]
pub struct ConstantImageEncoder {
    dim: usize,
    value: f32,
    fail_on: Option<String>,
}

impl ConstantImageEncoder {
    pub fn new(dim: usize, value: f32) -> Self {
        Self {
            dim,
            value,
            fail_on: None,
        }
    }

    /// Fail for any path ending in `file_name`.
    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.fail_on = Some(file_name.to_string());
        self
    }
}

impl ImageEncoder for ConstantImageEncoder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn encode(&self, path: &Path) -> Result<Vec<f32>, EncoderError> {
        if let Some(name) = &self.fail_on {
            if path.ends_with(name) {
                return Err(EncoderError::Image {
                    path: path.to_path_buf(),
                    message: "image not found".to_string(),
                });
            }
        }
        Ok(vec![self.value; self.dim])
    }
}

/// Text encoder producing a single feature: the question's length in chars.
#[derive(Debug, Clone, Copy)]
pub struct QuestionLengthEncoder;

impl TextEncoder for QuestionLengthEncoder {
    fn dim(&self) -> usize {
        1
    }

    fn encode(&self, question: &str) -> Result<Vec<f32>, EncoderError> {
        Ok(vec![question.chars().count() as f32])
    }
}
