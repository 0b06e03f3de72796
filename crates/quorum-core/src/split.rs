//! Train/validation partitioning of one annotated store.
//!
//! The training size is `floor(n * train_fraction)`. A contiguous split keeps
//! the file's order: the first records train and the rest validate. That is
//! skewed whenever the file is ordered by something that matters, so a
//! seeded shuffle is available as well. Either way the two index sets are
//! disjoint and together cover `0..n`.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{QuorumError, Result};

/// How record positions are assigned to the two partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SplitPolicy {
    /// First `floor(n * fraction)` records train, the rest validate
    Contiguous,
    /// Positions are shuffled with a fixed seed before cutting
    Shuffled { seed: u64 },
}

/// Index sets of one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
}

impl Split {
    /// Total number of positions covered.
    pub fn len(&self) -> usize {
        self.train.len() + self.valid.len()
    }

    /// Whether the split covers nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition `0..n` into training and validation positions.
///
/// Fails if the fraction is outside `(0, 1)` or either partition would be empty.
pub fn split_indices(n: usize, train_fraction: f64, policy: SplitPolicy) -> Result<Split> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(QuorumError::InvalidArgument(format!(
            "train_fraction must be in (0, 1), got {}",
            train_fraction
        )));
    }

    let train_size = (n as f64 * train_fraction).floor() as usize;
    if train_size == 0 || train_size >= n {
        return Err(QuorumError::InvalidArgument(format!(
            "splitting {} records at {} leaves an empty partition",
            n, train_fraction
        )));
    }

    let mut positions: Vec<usize> = (0..n).collect();
    match policy {
        SplitPolicy::Contiguous => {
            tracing::debug!("Contiguous split keeps input order; records must already be mixed");
        }
        SplitPolicy::Shuffled { seed } => {
            let mut rng = StdRng::seed_from_u64(seed);
            positions.shuffle(&mut rng);
        }
    }

    let valid = positions.split_off(train_size);
    let train = positions;

    tracing::info!(
        "Split {} records: {} training, {} validation ({:?})",
        n,
        train.len(),
        valid.len(),
        policy
    );

    Ok(Split { train, valid })
}
