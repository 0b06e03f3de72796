//! Fixed-size batches over a subset of a sample store.
//!
//! Batches are derived lazily, so a vocabulary coverage error surfaces at
//! the first batch that touches the unseen answer.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::dataset::{IndexedSample, SampleStore};
use crate::error::{DataResult, QuorumError, Result};

/// A group of indexed samples fed to the model together.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub samples: Vec<IndexedSample>,
}

impl Batch {
    /// Wrap already derived samples.
    pub fn new(samples: Vec<IndexedSample>) -> Self {
        Self { samples }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the batch holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Raw question strings, in batch order.
    pub fn questions(&self) -> Vec<&str> {
        self.samples.iter().map(|s| s.question.as_str()).collect()
    }

    /// Image references, in batch order.
    pub fn image_refs(&self) -> Vec<&str> {
        self.samples.iter().map(|s| s.image_ref.as_str()).collect()
    }

    /// Annotator answer ids per sample, or `None` if any sample is unlabeled.
    pub fn answer_matrix(&self) -> Option<Vec<&[u32]>> {
        self.samples
            .iter()
            .map(|s| s.labels.as_ref().map(|l| l.answer_ids.as_slice()))
            .collect()
    }

    /// Consensus ids per sample, or `None` if any sample is unlabeled.
    pub fn consensus_ids(&self) -> Option<Vec<u32>> {
        self.samples
            .iter()
            .map(|s| s.labels.as_ref().map(|l| l.consensus_id))
            .collect()
    }
}

/// Produces batches over chosen store positions.
pub struct Batcher<'a> {
    store: &'a SampleStore,
    indices: Vec<usize>,
    batch_size: usize,
    shuffle_seed: Option<u64>,
}

impl<'a> Batcher<'a> {
    /// Batch `indices` of `store` in groups of `batch_size`; the last may be short.
    pub fn new(store: &'a SampleStore, indices: Vec<usize>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(QuorumError::InvalidArgument(
                "batch_size must be > 0".into(),
            ));
        }
        Ok(Self {
            store,
            indices,
            batch_size,
            shuffle_seed: None,
        })
    }

    /// Batch every position of the store in order.
    pub fn sequential(store: &'a SampleStore, batch_size: usize) -> Result<Self> {
        Self::new(store, (0..store.len()).collect(), batch_size)
    }

    /// Reshuffle the positions every epoch, seeded from `seed` and the epoch number.
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Number of batches per epoch.
    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    /// Iterate the batches of one epoch.
    pub fn epoch(&self, epoch: usize) -> BatchIter<'a> {
        let mut order = self.indices.clone();
        if let Some(seed) = self.shuffle_seed {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);
        }
        BatchIter {
            store: self.store,
            order,
            batch_size: self.batch_size,
            cursor: 0,
        }
    }
}

/// Iterator over the batches of one epoch.
pub struct BatchIter<'a> {
    store: &'a SampleStore,
    order: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl Iterator for BatchIter<'_> {
    type Item = DataResult<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let chunk = &self.order[self.cursor..end];
        self.cursor = end;

        Some(
            chunk
                .iter()
                .map(|&i| self.store.get(i))
                .collect::<DataResult<Vec<_>>>()
                .map(Batch::new),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.order.len() - self.cursor).div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BatchIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{AnswerRecord, RawSample, StoreMode};
    use std::path::Path;

    fn store(n: usize) -> SampleStore {
        let records = (0..n)
            .map(|i| RawSample {
                image: format!("{i}.jpg"),
                question: format!("question {i}"),
                answers: Some(vec![AnswerRecord {
                    answer: if i % 2 == 0 { "yes" } else { "no" }.to_string(),
                }]),
            })
            .collect();
        let mut store =
            SampleStore::from_samples(records, Path::new("."), StoreMode::Annotated, 1).unwrap();
        store.build_vocabularies().unwrap();
        store
    }

    #[test]
    fn test_batches_cover_indices_with_short_tail() {
        let store = store(5);
        let batcher = Batcher::sequential(&store, 2).unwrap();
        assert_eq!(batcher.num_batches(), 3);

        let batches: Vec<Batch> = batcher.epoch(0).map(|b| b.unwrap()).collect();
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(batches[2].image_refs(), vec!["4.jpg"]);
    }

    #[test]
    fn test_labels_exposed() {
        let store = store(3);
        let batch = Batcher::sequential(&store, 3)
            .unwrap()
            .epoch(0)
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(batch.consensus_ids(), Some(vec![0, 1, 0]));
        let matrix = batch.answer_matrix().unwrap();
        assert_eq!(matrix[1], &[1]);
    }

    #[test]
    fn test_shuffle_is_per_epoch_and_deterministic() {
        let store = store(20);
        let batcher = Batcher::sequential(&store, 20).unwrap().with_shuffle(42);

        let order = |epoch| -> Vec<usize> {
            let batch = batcher.epoch(epoch).next().unwrap().unwrap();
            batch.samples.iter().map(|s| s.index).collect()
        };

        assert_eq!(order(0), order(0));
        assert_ne!(order(0), order(1));

        let mut sorted = order(1);
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_exact_size() {
        let store = store(7);
        let mut iter = Batcher::sequential(&store, 3).unwrap().epoch(0);
        assert_eq!(iter.len(), 3);
        iter.next();
        assert_eq!(iter.len(), 2);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let store = store(2);
        assert!(Batcher::sequential(&store, 0).is_err());
    }

    #[test]
    fn test_unlabeled_batch_has_no_matrix() {
        let store = SampleStore::from_samples(
            vec![RawSample {
                image: "t.jpg".into(),
                question: "q".into(),
                answers: None,
            }],
            Path::new("."),
            StoreMode::Inference,
            1,
        )
        .unwrap();
        let batch = Batcher::sequential(&store, 1)
            .unwrap()
            .epoch(0)
            .next()
            .unwrap()
            .unwrap();
        assert!(batch.answer_matrix().is_none());
        assert!(batch.consensus_ids().is_none());
    }
}
