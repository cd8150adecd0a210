//! src/dataloader/loader.rs
//!
//! DataLoader constructors.
//!
//! DataLoader creates the sampler from `config.shuffle`:
//! - If `config.shuffle = false`, DataLoader creates a SequentialSampler.
//! - If `config.shuffle = true`, DataLoader creates a RandomSampler seeded with `config.seed`.
//!
//! **Methods:**
//! - `new()` - default StackCollator
//! - `new_with_collator()` - custom Collator
//!
//! The index sampler is wrapped in a `BatchSampler` using the configured
//! `batch_size` and `drop_last`.

use crate::collator::{Collator, StackCollator};
use crate::dataset::InMemoryDataset;
use crate::sampler::{BatchSampler, RandomSampler, Sampler, SequentialSampler};
use anyhow::{anyhow, Context, Result};
use rand::Rng;
use std::sync::atomic::AtomicUsize;
use tracing::debug;

use super::config::DataLoaderConfig;

/// Yields mini-batches from a dataset, optionally in parallel.
///
/// # Thread safety:
/// - `DataLoader` itself is Send + Sync and can be shared across threads.
/// - Iterators are not Send and must be used on a single thread.
/// - Each call to `iter()` starts a new epoch.
///
/// # Type parameters:
/// - `D`: Dataset type
/// - `C`: Collator type (defaults to StackCollator)
pub struct DataLoader<D, C = StackCollator> {
    pub(crate) dataset: D,
    pub(crate) collator: C,
    pub(crate) config: DataLoaderConfig,
    pub(crate) batch_sampler: BatchSampler<Box<dyn Sampler<Item = usize>>>,
    pub(crate) current_epoch: AtomicUsize,
    pub(crate) runtime_seed: u64,
}

impl<Raw> DataLoader<InMemoryDataset<Raw>, StackCollator>
where
    Raw: Clone + Send + Sync + 'static,
{
    /// Creates a new DataLoader with the default StackCollator.
    ///
    /// # Example
    /// ```ignore
    /// let config = DataLoaderConfig::builder()
    ///     .batch_size(32)
    ///     .shuffle(true)
    ///     .seed(42)
    ///     .build();
    /// let dataloader = DataLoader::new(dataset, config)?;
    /// ```
    pub fn new(dataset: InMemoryDataset<Raw>, config: DataLoaderConfig) -> Result<Self> {
        Self::new_with_collator(dataset, config, StackCollator)
    }
}

impl<Raw, C> DataLoader<InMemoryDataset<Raw>, C>
where
    Raw: Clone + Send + Sync + 'static,
    C: Collator + Clone + Send + Sync + 'static,
{
    /// Creates a new DataLoader with a custom collator.
    ///
    /// # Errors
    /// - `batch_size` is 0
    /// - `prefetch_factor` is 0 when using workers
    /// - the dataset has no transform attached
    /// - `shuffle = true` on an empty dataset
    pub fn new_with_collator(
        dataset: InMemoryDataset<Raw>,
        mut config: DataLoaderConfig,
        collator: C,
    ) -> Result<Self> {
        let batch_size = config.batch_size.unwrap_or(1);
        let drop_last = config.drop_last.unwrap_or(false);
        let shuffle = config.shuffle.unwrap_or(false);
        config.batch_size = Some(batch_size);
        config.drop_last = Some(drop_last);
        config.shuffle = Some(shuffle);

        if batch_size == 0 {
            return Err(anyhow!("Batch size must be greater than 0"));
        }

        if config.prefetch_factor == 0 && config.num_workers > 0 {
            return Err(anyhow!(
                "Prefetch factor must be > 0 when using {} workers",
                config.num_workers
            ));
        }

        dataset.ensure_transform()?;

        let effective_seed = config.seed.unwrap_or_else(|| rand::rng().random());

        let sampler: Box<dyn Sampler<Item = usize>> = if shuffle {
            Box::new(RandomSampler::new(dataset.len(), effective_seed)?)
        } else {
            Box::new(SequentialSampler::new(dataset.len()))
        };

        let batch_sampler = BatchSampler::new(sampler, batch_size, drop_last)
            .context("Failed to wrap sampler with BatchSampler")?;

        debug!(
            samples = dataset.len(),
            batch_size,
            shuffle,
            num_workers = config.num_workers,
            "created data loader"
        );

        Ok(Self {
            dataset,
            collator,
            config,
            batch_sampler,
            current_epoch: AtomicUsize::new(0),
            runtime_seed: effective_seed,
        })
    }

    /// The dataset this loader draws from.
    pub fn dataset(&self) -> &InMemoryDataset<Raw> {
        &self.dataset
    }

    pub fn config(&self) -> &DataLoaderConfig {
        &self.config
    }

    /// Base seed for shuffling and worker RNGs. Random when the config left it unset.
    pub fn seed(&self) -> u64 {
        self.runtime_seed
    }

    /// Number of batches one epoch yields.
    pub fn len(&self) -> usize {
        let samples = self.dataset.len();
        let batch_size = self.config.batch_size.unwrap_or(1);
        if self.config.drop_last.unwrap_or(false) {
            samples / batch_size
        } else {
            samples.div_ceil(batch_size)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
