//! Leave-one-out consensus accuracy.
//!
//! For each annotator `i`, count how many of the *other* annotators gave the
//! predicted answer and credit `min(matches / 3, 1)`. The sample score is the
//! mean credit over annotators, so a prediction that at least three others
//! agree with in every leave-one-out view scores exactly 1.0.

use crate::error::{QuorumError, Result};

/// Agreeing annotators needed for full credit in one leave-one-out view.
const FULL_CREDIT_MATCHES: f64 = 3.0;

/// Consensus score of one prediction against its annotator answers.
///
/// Returns 0.0 when there are no annotators.
pub fn consensus_score(prediction: u32, answers: &[u32]) -> f64 {
    if answers.is_empty() {
        return 0.0;
    }

    let total_matches = answers.iter().filter(|&&a| a == prediction).count();

    let credit: f64 = answers
        .iter()
        .map(|&own| {
            // Leave annotator i out: its own answer cannot vouch for itself.
            let others = total_matches - usize::from(own == prediction);
            (others as f64 / FULL_CREDIT_MATCHES).min(1.0)
        })
        .sum();

    credit / answers.len() as f64
}

/// Mean consensus score over a batch.
///
/// Fails on an empty batch or when predictions and answer rows differ in length.
pub fn batch_consensus_score<A: AsRef<[u32]>>(predictions: &[u32], answers: &[A]) -> Result<f64> {
    check_batch(predictions.len(), answers.len())?;

    let total: f64 = predictions
        .iter()
        .zip(answers)
        .map(|(&prediction, row)| consensus_score(prediction, row.as_ref()))
        .sum();

    Ok(total / predictions.len() as f64)
}

/// Fraction of predictions exactly equal to the consensus label.
pub fn simple_accuracy(predictions: &[u32], consensus: &[u32]) -> Result<f64> {
    check_batch(predictions.len(), consensus.len())?;

    let hits = predictions
        .iter()
        .zip(consensus)
        .filter(|(p, c)| p == c)
        .count();

    Ok(hits as f64 / predictions.len() as f64)
}

fn check_batch(predictions: usize, labels: usize) -> Result<()> {
    if predictions == 0 {
        return Err(QuorumError::InvalidArgument(
            "cannot score an empty batch".into(),
        ));
    }
    if predictions != labels {
        return Err(QuorumError::InvalidArgument(format!(
            "batch has {} predictions but {} label rows",
            predictions, labels
        )));
    }
    Ok(())
}
