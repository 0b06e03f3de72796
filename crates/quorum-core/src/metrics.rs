//! Per-epoch metrics and the progress line built from them.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone};
use serde::{Deserialize, Serialize};

/// Timestamp format of the completion estimate.
const ESTIMATE_FORMAT: &str = "%m-%d %H:%M:%S";

/// Averages over one complete pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Mean criterion value per batch
    pub mean_loss: f64,

    /// Mean leave-one-out consensus accuracy per batch
    pub mean_consensus_accuracy: f64,

    /// Mean fraction of predictions equal to the consensus label per batch
    pub mean_simple_accuracy: f64,

    /// Wall-clock time of the whole pass
    pub elapsed_seconds: f64,

    /// Number of batches averaged
    pub batches: usize,
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loss={:.4} acc={:.4} simple_acc={:.4} time={:.2}s",
            self.mean_loss,
            self.mean_consensus_accuracy,
            self.mean_simple_accuracy,
            self.elapsed_seconds
        )
    }
}

/// Running sums over the batches of one pass.
#[derive(Debug, Clone, Default)]
pub struct RunningTotals {
    loss: f64,
    consensus: f64,
    simple: f64,
    count: usize,
}

impl RunningTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one batch's values.
    pub fn update(&mut self, loss: f64, consensus_accuracy: f64, simple_accuracy: f64) {
        self.loss += loss;
        self.consensus += consensus_accuracy;
        self.simple += simple_accuracy;
        self.count += 1;
    }

    /// Batches seen so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Short running summary for a progress bar message.
    pub fn display(&self) -> String {
        if self.count == 0 {
            return "no data".to_string();
        }
        let n = self.count as f64;
        format!(
            "loss={:.4} acc={:.4} simple_acc={:.4}",
            self.loss / n,
            self.consensus / n,
            self.simple / n
        )
    }

    /// Sums divided by batch count, or `None` before the first batch.
    pub fn finish(&self, elapsed: Duration) -> Option<EpochMetrics> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(EpochMetrics {
            mean_loss: self.loss / n,
            mean_consensus_accuracy: self.consensus / n,
            mean_simple_accuracy: self.simple / n,
            elapsed_seconds: elapsed.as_secs_f64(),
            batches: self.count,
        })
    }
}

/// Linear completion estimate: `start + elapsed / (epoch + 1) * total_epochs`.
///
/// `epoch` is the zero-based index of the epoch that just finished.
pub fn estimate_completion<Tz: TimeZone>(
    start: DateTime<Tz>,
    elapsed: Duration,
    epoch: usize,
    total_epochs: usize,
) -> DateTime<Tz> {
    let per_epoch = elapsed.as_secs_f64() / (epoch + 1) as f64;
    let millis = (per_epoch * total_epochs as f64 * 1000.0).round() as i64;
    start + TimeDelta::milliseconds(millis)
}

/// Format a completion estimate the way progress lines show it.
pub fn format_estimate<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    at.format(ESTIMATE_FORMAT).to_string()
}

/// One epoch's train and validation results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    /// One-based epoch number
    pub epoch: usize,

    pub total_epochs: usize,

    pub train: EpochMetrics,

    /// Absent when the session has no validation batches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid: Option<EpochMetrics>,

    /// Formatted completion estimate
    pub estimated_end: String,
}

impl fmt::Display for EpochReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] train: {}", self.epoch, self.total_epochs, self.train)?;
        if let Some(valid) = &self.valid {
            write!(f, " | valid: {}", valid)?;
        }
        write!(f, " | estimated end: {}", self.estimated_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_totals_average_per_batch() {
        let mut totals = RunningTotals::new();
        totals.update(2.0, 0.5, 1.0);
        totals.update(4.0, 0.25, 0.0);

        let m = totals.finish(Duration::from_millis(1500)).unwrap();
        assert_eq!(m.batches, 2);
        assert!((m.mean_loss - 3.0).abs() < 1e-12);
        assert!((m.mean_consensus_accuracy - 0.375).abs() < 1e-12);
        assert!((m.mean_simple_accuracy - 0.5).abs() < 1e-12);
        assert!((m.elapsed_seconds - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_totals_produce_nothing() {
        let totals = RunningTotals::new();
        assert!(totals.finish(Duration::from_secs(1)).is_none());
        assert_eq!(totals.display(), "no data");
    }

    #[test]
    fn test_estimate_extrapolates_linearly() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        // Two of five epochs took 4 minutes -> 10 minutes total.
        let end = estimate_completion(start, Duration::from_secs(240), 1, 5);
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 1, 12, 10, 0).unwrap());
        assert_eq!(format_estimate(&end), "03-01 12:10:00");
    }

    #[test]
    fn test_report_line() {
        let metrics = EpochMetrics {
            mean_loss: 1.23456,
            mean_consensus_accuracy: 0.5,
            mean_simple_accuracy: 0.25,
            elapsed_seconds: 3.0,
            batches: 4,
        };
        let report = EpochReport {
            epoch: 1,
            total_epochs: 5,
            train: metrics,
            valid: Some(metrics),
            estimated_end: "03-01 12:10:00".to_string(),
        };
        let line = report.to_string();
        assert!(line.starts_with("[1/5] train: loss=1.2346 acc=0.5000 simple_acc=0.2500 time=3.00s"));
        assert!(line.contains(" | valid: loss=1.2346"));
        assert!(line.ends_with("estimated end: 03-01 12:10:00"));
    }

    #[test]
    fn test_report_serializes_without_valid() {
        let report = EpochReport {
            epoch: 2,
            total_epochs: 2,
            train: EpochMetrics {
                mean_loss: 0.0,
                mean_consensus_accuracy: 1.0,
                mean_simple_accuracy: 1.0,
                elapsed_seconds: 0.5,
                batches: 1,
            },
            valid: None,
            estimated_end: "x".to_string(),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("valid"));
        let parsed: EpochReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
