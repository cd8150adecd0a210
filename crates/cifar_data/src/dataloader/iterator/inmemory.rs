//! src/dataloader/iterator/inmemory.rs
//!
//! `iter()` for loaders over an `InMemoryDataset`.
//!
//! - `num_workers = 0`: IteratorImpl::Single
//! - `num_workers > 0`: IteratorImpl::Multi with a pool spawned for this epoch

use crate::collator::Collator;
use crate::dataset::InMemoryDataset;
use anyhow::{Context, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::{DataLoaderIter, IteratorConfig, IteratorImpl};
use crate::dataloader::loader::DataLoader;
use crate::dataloader::workers::inmemory::InMemoryWorkerManager;
use crate::sampler::Sampler;

impl<Raw, C> DataLoader<InMemoryDataset<Raw>, C>
where
    Raw: Clone + Send + Sync + 'static,
    C: Collator + Clone + Send + Sync + 'static,
{
    /// Creates an iterator over the batches of the next epoch.
    ///
    /// Every call advances the epoch counter. A shuffling loader draws a new
    /// order per epoch; worker RNGs are reseeded per epoch either way.
    pub fn iter(&self) -> Result<DataLoaderIter<'_, Raw, C>> {
        let epoch = self.current_epoch.fetch_add(1, Ordering::SeqCst);
        let sampler_epoch = if self.config.shuffle.unwrap_or(false) {
            epoch
        } else {
            0
        };
        let batch_indices = self.batch_sampler.iter(sampler_epoch);

        let config = IteratorConfig {
            collator: &self.collator,
            timeout: self.config.timeout,
            prefetch_factor: self.config.prefetch_factor,
            runtime_seed: self.runtime_seed,
            epoch,
            pin_memory: self.config.pin_memory,
        };

        let inner = if self.config.num_workers > 0 {
            let worker_manager = InMemoryWorkerManager::spawn(
                Arc::new(self.dataset.clone()),
                self.collator.clone(),
                &self.config,
                epoch,
                self.runtime_seed,
            )
            .with_context(|| format!("Failed to start workers for epoch {}", epoch))?;

            IteratorImpl::Multi {
                worker_manager,
                batch_indices,
                config,
                pending_tasks: 0,
                batch_index: 0,
                finished: false,
            }
        } else {
            IteratorImpl::Single {
                dataset: &self.dataset,
                batch_indices,
                config,
                rng_scope: None,
                exhausted: false,
            }
        };

        Ok(DataLoaderIter { inner })
    }
}
