//! One pass over a batch sequence.
//!
//! The runner drives the external model batch by batch, scores its
//! predictions against the annotator answers and averages loss and both
//! accuracies over the pass. Any failure aborts the pass: metrics are only
//! produced for a complete sequence of batches.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use crate::batch::Batch;
use crate::error::{DataResult, EpochError};
use crate::math::argmax_rows;
use crate::metrics::{EpochMetrics, RunningTotals};
use crate::model::{Mode, VqaModel};
use crate::scoring::{batch_consensus_score, simple_accuracy};

/// Where the runner is in its pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// No batch consumed yet, or the last pass was aborted
    Idle,
    /// At least one batch consumed
    Running,
    /// The last pass completed and produced metrics
    Done,
}

/// Drives a [`VqaModel`] over batches and aggregates [`EpochMetrics`].
pub struct EpochRunner {
    state: RunnerState,
    progress: ProgressBar,
}

impl Default for EpochRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl EpochRunner {
    /// A runner without a visible progress bar.
    pub fn new() -> Self {
        Self {
            state: RunnerState::Idle,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report progress on `bar`; its message shows the running averages.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = bar;
        self
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Run one pass.
    ///
    /// In [`Mode::Train`] every batch ends with one optimizer step; in
    /// [`Mode::Eval`] parameters are never touched. Model errors come back
    /// unchanged in [`EpochError::Model`]. A pass with no batches is an
    /// invalid argument since it has no meaningful average.
    pub fn run<M, I>(
        &mut self,
        model: &mut M,
        batches: I,
        mode: Mode,
    ) -> Result<EpochMetrics, EpochError<M::Error>>
    where
        M: VqaModel,
        I: IntoIterator<Item = DataResult<Batch>>,
    {
        self.state = RunnerState::Idle;
        model.set_mode(mode);

        let start = Instant::now();
        let mut totals = RunningTotals::new();

        for (n, batch) in batches.into_iter().enumerate() {
            self.state = RunnerState::Running;
            match Self::step(model, batch, mode, &mut totals) {
                Ok(()) => {}
                Err(e) => {
                    self.state = RunnerState::Idle;
                    self.progress.abandon_with_message(format!("aborted at batch {}", n));
                    return Err(e);
                }
            }
            self.progress.inc(1);
            self.progress.set_message(totals.display());
        }

        let metrics = totals.finish(start.elapsed()).ok_or_else(|| {
            EpochError::InvalidArgument(format!("{} pass produced no batches", mode))
        })?;

        self.state = RunnerState::Done;
        self.progress.finish_with_message(totals.display());
        tracing::debug!(
            mode = %mode,
            batches = metrics.batches,
            elapsed = metrics.elapsed_seconds,
            "Pass complete"
        );
        Ok(metrics)
    }

    fn step<M: VqaModel>(
        model: &mut M,
        batch: DataResult<Batch>,
        mode: Mode,
        totals: &mut RunningTotals,
    ) -> Result<(), EpochError<M::Error>> {
        let batch = batch?;
        let consensus = batch.consensus_ids().ok_or_else(|| {
            EpochError::InvalidArgument("batch contains samples without answers".to_string())
        })?;
        let answers = batch.answer_matrix().ok_or_else(|| {
            EpochError::InvalidArgument("batch contains samples without answers".to_string())
        })?;

        let logits = model.forward(&batch).map_err(EpochError::Model)?;
        let loss = model.loss(&logits, &consensus).map_err(EpochError::Model)?;
        let loss_value = model.loss_value(&loss);
        if mode == Mode::Train {
            model.optimize(loss).map_err(EpochError::Model)?;
        }

        let predictions = argmax_rows(&logits).map_err(|row| {
            EpochError::InvalidArgument(format!("logits row {} has no finite maximum", row))
        })?;
        let consensus_accuracy =
            batch_consensus_score(&predictions, &answers).map_err(EpochError::Scoring)?;
        let simple = simple_accuracy(&predictions, &consensus).map_err(EpochError::Scoring)?;

        tracing::debug!(
            batch = totals.count(),
            size = batch.len(),
            loss = loss_value,
            consensus_accuracy,
            simple_accuracy = simple,
            "Batch scored"
        );
        totals.update(loss_value, consensus_accuracy, simple);
        Ok(())
    }
}

/// Create a progress bar for one pass over `total` batches.
pub fn create_progress_bar(total: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{prefix:>5} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    ) {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_prefix(label.to_string());
    pb.set_message("starting...");
    pb
}
