use anyhow::{ensure, Result};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

/// A `Sampler` defines the order in which dataset positions are visited.
///
/// # Associated type
/// - `Item`: what the iterator yields: a `usize` position for index
///   samplers, a `Vec<usize>` for batch samplers.
///
/// # Method
/// - `iter(epoch)`: returns the sequence for that epoch. Random samplers
///   derive their RNG from a base seed and the epoch, so each epoch gets a
///   fresh but reproducible order.
///
/// Implementations must be `Send + Sync` so a sampler can live inside a
/// `DataLoader` that is shared across threads.
pub trait Sampler: Send + Sync {
    type Item: Send + Sync;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_>;
}

/// Yields positions in order `0, 1, ..., dataset_size - 1`, the same every epoch.
///
/// # Examples
/// ```ignore
/// let sampler = SequentialSampler::new(5);
/// let indices: Vec<_> = sampler.iter(0).collect();
/// assert_eq!(indices, vec![0, 1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct SequentialSampler {
    dataset_size: usize,
}

impl SequentialSampler {
    pub fn new(dataset_size: usize) -> Self {
        Self { dataset_size }
    }
}

impl Sampler for SequentialSampler {
    type Item = usize;

    fn iter(&self, _epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        Box::new(0..self.dataset_size)
    }
}

/// A random permutation of `0..dataset_size`, reshuffled every epoch.
///
/// # Seed Handling
/// The RNG for an epoch is `StdRng::seed_from_u64(base_seed + epoch)`:
/// - the same `base_seed` reproduces the whole sequence of epochs
/// - consecutive epochs see different orders
///
/// # Example usage
/// ```ignore
/// let sampler = RandomSampler::new(50_000, 42)?;
/// let epoch0: Vec<_> = sampler.iter(0).collect();
/// ```
#[derive(Debug, Clone)]
pub struct RandomSampler {
    dataset_size: usize,
    base_seed: u64,
}

impl RandomSampler {
    pub fn new(dataset_size: usize, base_seed: u64) -> Result<Self> {
        ensure!(
            dataset_size > 0,
            "Cannot shuffle an empty dataset (dataset_size=0)"
        );
        Ok(Self {
            dataset_size,
            base_seed,
        })
    }

    /// Derives a deterministic random number generator for the given epoch
    #[inline]
    fn derive_rng_for_epoch(&self, epoch: usize) -> StdRng {
        StdRng::seed_from_u64(self.base_seed.wrapping_add(epoch as u64))
    }
}

impl Sampler for RandomSampler {
    type Item = usize;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        let mut rng = self.derive_rng_for_epoch(epoch);
        let mut indices: Vec<_> = (0..self.dataset_size).collect();
        indices.shuffle(&mut rng);
        Box::new(indices.into_iter())
    }
}

/// Groups the positions of an underlying sampler into mini-batches.
///
/// If `drop_last` is `true`, a final mini-batch smaller than `batch_size` is discarded.
///
/// # Example
/// ```ignore
/// let batch_sampler = BatchSampler::new(SequentialSampler::new(10), 4, false)?;
/// // [0, 1, 2, 3], [4, 5, 6, 7], [8, 9]
/// ```
#[derive(Debug, Clone)]
pub struct BatchSampler<S> {
    sampler: S,
    batch_size: usize,
    drop_last: bool,
}

impl<S: Sampler> BatchSampler<S> {
    pub fn new(sampler: S, batch_size: usize, drop_last: bool) -> Result<Self> {
        ensure!(
            batch_size > 0,
            "batch_size must be > 0, but got batch_size={}",
            batch_size
        );
        Ok(Self {
            sampler,
            batch_size,
            drop_last,
        })
    }
}

impl<S: Sampler> Sampler for BatchSampler<S> {
    type Item = Vec<S::Item>;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_> {
        let mut sampler_iter = self.sampler.iter(epoch);
        let batch_size = self.batch_size;
        let drop_last = self.drop_last;

        Box::new(std::iter::from_fn(move || {
            let mini_batch: Vec<_> = sampler_iter.by_ref().take(batch_size).collect();
            if mini_batch.len() == batch_size || (!drop_last && !mini_batch.is_empty()) {
                Some(mini_batch)
            } else {
                None
            }
        }))
    }
}

/// Lets the loader pick sequential or random order at runtime.
impl Sampler for Box<dyn Sampler<Item = usize>> {
    type Item = usize;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        (**self).iter(epoch)
    }
}
