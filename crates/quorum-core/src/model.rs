//! Contracts for the external collaborators.
//!
//! The image encoder, the text encoder and the answer classifier are opaque
//! to this crate. Encoders map one raw input to one fixed-size vector; the
//! model maps a batch to one row of answer logits per sample and owns its
//! criterion and optimizer.

use std::path::Path;

use crate::batch::Batch;
use crate::dataset::SampleStore;
use crate::error::EncoderError;
use crate::math::concat;

/// One row of logits per sample, one column per answer id.
pub type Logits = Vec<Vec<f32>>;

/// Whether a pass may update parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Forward, loss and one optimizer step per batch
    Train,
    /// Forward and loss only
    Eval,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Train => write!(f, "train"),
            Mode::Eval => write!(f, "eval"),
        }
    }
}

/// Maps an image file to a feature vector.
pub trait ImageEncoder {
    /// Output vector length.
    fn dim(&self) -> usize;

    /// Encode the image at `path`.
    fn encode(&self, path: &Path) -> Result<Vec<f32>, EncoderError>;
}

/// Maps a question string to a feature vector.
pub trait TextEncoder {
    /// Output vector length.
    fn dim(&self) -> usize;

    /// Encode one question.
    fn encode(&self, question: &str) -> Result<Vec<f32>, EncoderError>;
}

/// Answer classifier driven by the epoch runner.
///
/// `Loss` is whatever the model needs to run its backward pass; the runner
/// only reads its scalar value and hands it back to [`VqaModel::optimize`].
pub trait VqaModel {
    type Loss;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Switch between training and evaluation behavior.
    fn set_mode(&mut self, mode: Mode);

    /// Logits for every sample in the batch.
    fn forward(&mut self, batch: &Batch) -> Result<Logits, Self::Error>;

    /// Criterion against the consensus ids.
    fn loss(&mut self, logits: &Logits, targets: &[u32]) -> Result<Self::Loss, Self::Error>;

    /// Scalar value of a loss.
    fn loss_value(&self, loss: &Self::Loss) -> f64;

    /// Zero gradients, backpropagate `loss` and take one optimizer step.
    fn optimize(&mut self, loss: Self::Loss) -> Result<(), Self::Error>;
}

/// Joint image + question features for a batch.
///
/// Each row is the image vector followed by the question vector.
pub struct FeatureFusion<I, T> {
    image: I,
    text: T,
}

impl<I: ImageEncoder, T: TextEncoder> FeatureFusion<I, T> {
    /// Pair an image encoder with a text encoder.
    pub fn new(image: I, text: T) -> Self {
        Self { image, text }
    }

    /// Length of one fused row.
    pub fn dim(&self) -> usize {
        self.image.dim() + self.text.dim()
    }

    /// Encode every sample of `batch`, resolving images through `store`.
    pub fn features(&self, store: &SampleStore, batch: &Batch) -> Result<Logits, EncoderError> {
        batch
            .samples
            .iter()
            .map(|sample| -> Result<Vec<f32>, EncoderError> {
                let image = self.image.encode(&store.image_path(sample.index)?)?;
                let question = self.text.encode(&sample.question)?;
                Ok(concat(&[image.as_slice(), question.as_slice()]))
            })
            .collect()
    }
}
