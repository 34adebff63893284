use anyhow::{ensure, Result};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

/// How many minibatches of indices a megabatch spans before length-sorting.
/// Larger megabatches give tighter length buckets per minibatch but less
/// shuffle variety across epochs.
const MEGABATCH_MULTIPLIER: usize = 50;

/// A `Sampler` defines the strategy for how to iterate and draw samples from
/// a dataset.
///
/// # Associated type
/// - `Item`: The handle yielded by the iterator — `usize` indices for the
///   in-memory datasets in this crate.
///
/// # Method
/// - `iter(epoch)`: returns the index sequence for that epoch. Randomized
///   samplers combine the `epoch` with their base RNG seed, so the same
///   `(seed, epoch)` pair always reproduces the same order.
///
/// Implementations must be `Send + Sync` so the same sampler instance can be
/// safely shared across consumers of a read-only dataset.
pub trait Sampler: Send + Sync {
    type Item: Send + Sync;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_>;
}

/// ============================================================================
/// Yields all indices sorted by a length key, longest first.
///
/// Fully deterministic: no RNG, no epoch dependence. This is the ordering of
/// choice for validation splits, where batches of near-equal length minimize
/// padding and reproducibility matters more than variety.
///
/// # Type parameters
/// - `F`: A function mapping `usize -> usize`, the per-index length key.
///
/// # Example
/// ```ignore
/// let lengths = vec![3usize, 1, 2];
/// let sampler = SortSampler::new(lengths.len(), move |i| lengths[i]);
/// let order: Vec<_> = sampler.iter(0).collect();
/// assert_eq!(order, vec![0, 2, 1]);
/// ```
#[derive(Debug, Clone)]
pub struct SortSampler<F>
where
    F: Fn(usize) -> usize + Send + Sync,
{
    dataset_size: usize,
    key: F,
}

impl<F> SortSampler<F>
where
    F: Fn(usize) -> usize + Send + Sync,
{
    pub fn new(dataset_size: usize, key: F) -> Self {
        Self { dataset_size, key }
    }

    pub fn len(&self) -> usize {
        self.dataset_size
    }

    pub fn is_empty(&self) -> bool {
        self.dataset_size == 0
    }
}

impl<F> Sampler for SortSampler<F>
where
    F: Fn(usize) -> usize + Send + Sync,
{
    type Item = usize;

    fn iter(&self, _epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        let mut indices: Vec<usize> = (0..self.dataset_size).collect();
        // Stable sort: equal lengths keep their dataset order.
        indices.sort_by_key(|&i| std::cmp::Reverse((self.key)(i)));
        Box::new(indices.into_iter())
    }
}

/// ============================================================================
/// Yields indices in approximately-sorted length order: minibatches group
/// items of similar length to minimize padding, while shuffling at two
/// granularities keeps epochs varied.
///
/// # Arguments
/// - `dataset_size`: Total number of samples in the dataset.
/// - `key`: Function mapping `usize -> usize`, the per-index length key.
/// - `batch_size`: Target minibatch size. Must be >= 1.
/// - `base_seed`: Base RNG seed; the epoch RNG is `base_seed + epoch`.
///
/// # Algorithm
/// 1. Shuffle all indices, then partition them into megabatches of
///    `batch_size * 50` and sort each megabatch by key, descending.
/// 2. Re-chunk the result into minibatches of `batch_size` and shuffle the
///    order of those minibatches — not their contents — so consecutive
///    epochs see different batch orderings with unchanged length grouping.
/// 3. The minibatch holding the globally longest item is moved to the
///    front. The first batch a consumer sees is therefore its worst-case
///    memory shape, so an allocation probed on it never underestimates.
///
/// Datasets smaller than one minibatch, or not evenly divisible into
/// minibatches, skip the megabatch machinery and fall back to a plain
/// descending sort, which preserves both guarantees above.
///
/// # Example
/// ```ignore
/// let lengths: Vec<usize> = texts.iter().map(|t| t.len()).collect();
/// let sampler = SortishSampler::new(texts.len(), move |i| lengths[i], 32, 42)?;
/// for epoch in 0..epochs {
///     for index in sampler.iter(epoch) { /* fetch texts[index] */ }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SortishSampler<F>
where
    F: Fn(usize) -> usize + Send + Sync,
{
    dataset_size: usize,
    key: F,
    batch_size: usize,
    base_seed: u64,
}

impl<F> SortishSampler<F>
where
    F: Fn(usize) -> usize + Send + Sync,
{
    pub fn new(dataset_size: usize, key: F, batch_size: usize, base_seed: u64) -> Result<Self> {
        ensure!(
            batch_size > 0,
            "batch_size must be > 0, but got batch_size={}",
            batch_size
        );
        Ok(Self {
            dataset_size,
            key,
            batch_size,
            base_seed,
        })
    }

    /// Always the dataset size, on every branch of the algorithm.
    pub fn len(&self) -> usize {
        self.dataset_size
    }

    pub fn is_empty(&self) -> bool {
        self.dataset_size == 0
    }

    /// Computes the full index permutation for `epoch`.
    ///
    /// Pure in `(key, base_seed, epoch)`: no internal state survives the
    /// call, so repeated invocations with the same epoch are identical.
    pub fn permutation(&self, epoch: usize) -> Vec<usize> {
        let n = self.dataset_size;
        let bs = self.batch_size;
        if n == 0 {
            return Vec::new();
        }

        // Tiny or ragged datasets: a full descending sort is both correct
        // and deterministic, and still leads with the longest item.
        if n < bs || n % bs != 0 {
            let mut indices: Vec<usize> = (0..n).collect();
            indices.sort_by_key(|&i| std::cmp::Reverse((self.key)(i)));
            return indices;
        }

        let mut rng = StdRng::seed_from_u64(self.base_seed.wrapping_add(epoch as u64));

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);
        for megabatch in indices.chunks_mut(bs * MEGABATCH_MULTIPLIER) {
            megabatch.sort_by_key(|&i| std::cmp::Reverse((self.key)(i)));
        }

        // n % bs == 0 here, so every minibatch is full and its head is its
        // longest member.
        let mut minibatches: Vec<&[usize]> = indices.chunks(bs).collect();
        let longest = minibatches
            .iter()
            .enumerate()
            .max_by_key(|(_, batch)| (self.key)(batch[0]))
            .map(|(position, _)| position)
            .unwrap_or(0);
        minibatches.swap(0, longest);
        minibatches[1..].shuffle(&mut rng);

        minibatches.into_iter().flatten().copied().collect()
    }
}

impl<F> Sampler for SortishSampler<F>
where
    F: Fn(usize) -> usize + Send + Sync,
{
    type Item = usize;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        Box::new(self.permutation(epoch).into_iter())
    }
}

/// ============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const TEST_SEED: u64 = 42;

    fn key_from(lengths: Vec<usize>) -> impl Fn(usize) -> usize + Send + Sync {
        move |i| lengths[i]
    }

    mod sort_sampler_tests {
        use super::*;

        #[test]
        fn yields_descending_lengths() {
            let sampler = SortSampler::new(4, key_from(vec![2, 9, 4, 7]));
            let order: Vec<_> = sampler.iter(0).collect();
            assert_eq!(order, vec![1, 3, 2, 0]);
        }

        #[test]
        fn equal_lengths_keep_dataset_order() {
            let sampler = SortSampler::new(3, key_from(vec![5, 5, 5]));
            let order: Vec<_> = sampler.iter(0).collect();
            assert_eq!(order, vec![0, 1, 2]);
        }

        #[test]
        fn handles_empty_dataset() {
            let sampler = SortSampler::new(0, |_| 0);
            assert_eq!(sampler.iter(0).count(), 0);
            assert!(sampler.is_empty());
        }
    }

    mod sortish_sampler_tests {
        use super::*;

        #[test]
        fn validates_parameters() {
            assert!(SortishSampler::new(10, |i| i, 2, TEST_SEED).is_ok());
            assert!(SortishSampler::new(10, |i| i, 0, TEST_SEED).is_err());
        }

        #[test]
        fn yields_a_full_permutation() {
            let lengths: Vec<usize> = (0..100).map(|i| (i * 37) % 50 + 1).collect();
            let sampler = SortishSampler::new(100, key_from(lengths), 4, TEST_SEED).unwrap();

            let order: Vec<_> = sampler.iter(0).collect();
            assert_eq!(sampler.len(), 100);
            assert_eq!(order.len(), 100);
            assert_eq!(HashSet::<_>::from_iter(order).len(), 100);
        }

        #[test]
        fn longest_item_leads_the_first_batch() {
            let lengths: Vec<usize> = (1..=10).collect();
            let sampler = SortishSampler::new(10, key_from(lengths.clone()), 2, TEST_SEED).unwrap();

            for epoch in 0..5 {
                let order: Vec<_> = sampler.iter(epoch).collect();
                assert!(
                    order[..2].contains(&9),
                    "longest index 9 missing from first batch {:?} at epoch {}",
                    &order[..2],
                    epoch
                );
                // Minibatches are sorted internally, so the head is the max.
                assert_eq!(order[0], 9);
            }
        }

        #[test]
        fn two_element_dataset_puts_larger_first() {
            let sampler = SortishSampler::new(2, key_from(vec![1, 10]), 2, TEST_SEED).unwrap();
            let order: Vec<_> = sampler.iter(0).collect();
            assert_eq!(order.len(), 2);
            assert_eq!(order[0], 1);
        }

        #[test]
        fn ragged_dataset_falls_back_to_full_sort() {
            // 5 items with batch_size 2: not evenly divisible.
            let sampler = SortishSampler::new(5, key_from(vec![3, 8, 1, 9, 5]), 2, TEST_SEED).unwrap();
            let order: Vec<_> = sampler.iter(7).collect();
            assert_eq!(order, vec![3, 1, 4, 0, 2]);
            assert_eq!(sampler.len(), 5);
        }

        #[test]
        fn batches_group_similar_lengths() {
            let lengths: Vec<usize> = (0..200).map(|i| (i * 13) % 100 + 1).collect();
            let bs = 4;
            let sampler = SortishSampler::new(200, key_from(lengths.clone()), bs, TEST_SEED).unwrap();

            let order: Vec<_> = sampler.iter(0).collect();
            for batch in order.chunks(bs) {
                let batch_lengths: Vec<usize> = batch.iter().map(|&i| lengths[i]).collect();
                let spread =
                    batch_lengths.iter().max().unwrap() - batch_lengths.iter().min().unwrap();
                // One megabatch covers the whole dataset here, so each batch
                // spans at most a few neighboring ranks of the sorted order.
                assert!(spread <= 10, "batch lengths too far apart: {:?}", batch_lengths);
            }
        }

        #[test]
        fn shuffles_deterministically_per_epoch() {
            let lengths: Vec<usize> = (0..100).map(|i| (i * 7) % 40 + 1).collect();
            let sampler = SortishSampler::new(100, key_from(lengths), 2, TEST_SEED).unwrap();

            let epoch1a = sampler.permutation(1);
            let epoch1b = sampler.permutation(1);
            let epoch2 = sampler.permutation(2);

            assert_eq!(epoch1a, epoch1b, "same epoch must reproduce the same order");
            assert_ne!(epoch1a, epoch2, "different epochs should differ");
        }
    }
}
