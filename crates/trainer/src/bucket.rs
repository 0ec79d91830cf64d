//! Length-bucketed batch planning.
//!
//! Works on example lengths only and yields index batches, so it can be
//! reused by any batch source.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Number of batches worth of examples sorted together in one pool.
pub const POOL_FACTOR: usize = 100;

#[derive(Debug, Clone)]
pub struct BucketSampler {
    batch_size: usize,
    shuffle: bool,
    seed: u64,
}

impl BucketSampler {
    /// Shuffled, bucketed batches; a different order every epoch.
    pub fn train(batch_size: usize, seed: u64) -> Self {
        Self {
            batch_size: batch_size.max(1),
            shuffle: true,
            seed,
        }
    }

    /// Length-sorted batches in a fixed order.
    pub fn eval(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            shuffle: false,
            seed: 0,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Plans the batches for `epoch`. `lengths[i]` is the (source, target)
    /// length of example `i`; every index appears in exactly one batch.
    pub fn batches(&self, lengths: &[(usize, usize)], epoch: usize) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..lengths.len()).collect();

        if !self.shuffle {
            indices.sort_by_key(|&i| lengths[i]);
            return indices.chunks(self.batch_size).map(<[usize]>::to_vec).collect();
        }

        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(epoch as u64));
        indices.shuffle(&mut rng);

        let mut batches = Vec::with_capacity(lengths.len() / self.batch_size + 1);
        for pool in indices.chunks_mut(self.batch_size * POOL_FACTOR) {
            pool.sort_by_key(|&i| lengths[i]);
            batches.extend(pool.chunks(self.batch_size).map(<[usize]>::to_vec));
        }
        batches.shuffle(&mut rng);
        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lengths(n: usize) -> Vec<(usize, usize)> {
        (0..n).map(|i| ((i * 7919) % 37 + 1, (i * 104729) % 41 + 1)).collect()
    }

    fn assert_partition(batches: &[Vec<usize>], n: usize) {
        let mut seen: Vec<usize> = batches.iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn train_batches_cover_every_example_once() {
        let lens = lengths(1003);
        let sampler = BucketSampler::train(16, 7);
        let batches = sampler.batches(&lens, 1);
        assert_partition(&batches, lens.len());
        assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= 16));
    }

    #[test]
    fn train_order_changes_between_epochs_but_is_reproducible() {
        let lens = lengths(500);
        let sampler = BucketSampler::train(8, 7);
        assert_eq!(sampler.batches(&lens, 1), sampler.batches(&lens, 1));
        assert_ne!(sampler.batches(&lens, 1), sampler.batches(&lens, 2));
    }

    #[test]
    fn bucketing_reduces_padding() {
        let lens = lengths(1600);
        let padding = |batches: &[Vec<usize>]| -> usize {
            batches
                .iter()
                .map(|b| {
                    let max = b.iter().map(|&i| lens[i].0).max().unwrap_or(0);
                    b.iter().map(|&i| max - lens[i].0).sum::<usize>()
                })
                .sum()
        };

        let bucketed = BucketSampler::train(16, 3).batches(&lens, 1);
        let naive: Vec<Vec<usize>> = (0..lens.len())
            .collect::<Vec<_>>()
            .chunks(16)
            .map(<[usize]>::to_vec)
            .collect();
        assert!(padding(&bucketed) * 4 < padding(&naive));
    }

    #[test]
    fn eval_batches_are_sorted_and_fixed() {
        let lens = lengths(99);
        let sampler = BucketSampler::eval(10);
        let first = sampler.batches(&lens, 1);
        assert_eq!(first, sampler.batches(&lens, 5));
        assert_partition(&first, lens.len());

        let flat: Vec<(usize, usize)> = first.iter().flatten().map(|&i| lens[i]).collect();
        assert!(flat.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(first.last().map(Vec::len), Some(9));
    }

    #[test]
    fn empty_dataset_yields_no_batches() {
        assert!(BucketSampler::train(4, 1).batches(&[], 1).is_empty());
        assert!(BucketSampler::eval(4).batches(&[], 1).is_empty());
    }
}
