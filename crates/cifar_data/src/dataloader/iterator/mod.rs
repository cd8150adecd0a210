//! src/dataloader/iterator/mod.rs
//!
//! Iteration logic that bridges the dataset, the batch sampler and the
//! workers to produce mini-batches.
//!
//! - `DataLoaderIter`: The public iterator type returned by `DataLoader::iter()`
//! - `IteratorImpl`: `Single` (no workers) or `Multi` (fresh workers for this epoch)
//! - `IteratorConfig`: Per-epoch settings shared by both variants

use crate::collator::Collator;
use crate::dataset::InMemoryDataset;
use crate::minibatch::MiniBatch;
use anyhow::Result;
use std::time::Duration;
use tracing::warn;

use super::workers::inmemory::InMemoryWorkerManager;
use crate::dataloader::common::thread::WorkerRngScope;

pub(crate) mod inmemory;

/// Per-epoch settings shared by both iterator variants.
struct IteratorConfig<'a, C> {
    collator: &'a C,
    timeout: Duration,
    prefetch_factor: usize,
    runtime_seed: u64,
    epoch: usize,
    pin_memory: bool,
}

/// Iterator over the mini-batches of one epoch.
///
/// Created by calling `dataloader.iter()`.
pub struct DataLoaderIter<'a, Raw, C> {
    inner: IteratorImpl<'a, Raw, C>,
}

enum IteratorImpl<'a, Raw, C> {
    /// Everything runs on the calling thread, as worker 0. `rng_scope`
    /// holds the caller's own RNG state until the epoch ends.
    Single {
        dataset: &'a InMemoryDataset<Raw>,
        batch_indices: Box<dyn Iterator<Item = Vec<usize>> + Send + 'a>,
        config: IteratorConfig<'a, C>,
        rng_scope: Option<WorkerRngScope>,
        exhausted: bool,
    },

    /// Fresh worker pool for this epoch.
    /// - `pending_tasks`: batches sent but not yet received
    /// - `batch_index`: next batch number, used for round-robin worker assignment
    Multi {
        worker_manager: InMemoryWorkerManager,
        batch_indices: Box<dyn Iterator<Item = Vec<usize>> + Send + 'a>,
        config: IteratorConfig<'a, C>,
        pending_tasks: usize,
        batch_index: usize,
        finished: bool,
    },
}

impl<Raw, C> Iterator for DataLoaderIter<'_, Raw, C>
where
    Raw: Clone + Send + Sync + 'static,
    C: Collator,
{
    type Item = Result<MiniBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IteratorImpl::Single {
                dataset,
                batch_indices,
                config,
                rng_scope,
                exhausted,
            } => {
                if *exhausted {
                    return None;
                }
                if rng_scope.is_none() {
                    *rng_scope = Some(WorkerRngScope::enter(0, config.epoch, config.runtime_seed));
                }

                let Some(indices) = batch_indices.next() else {
                    *rng_scope = None;
                    *exhausted = true;
                    return None;
                };
                Some(InMemoryWorkerManager::process_batch_lazy(
                    *dataset,
                    &indices,
                    config.collator,
                    config.pin_memory,
                ))
            }

            IteratorImpl::Multi {
                worker_manager,
                batch_indices,
                config,
                pending_tasks,
                batch_index,
                finished,
            } => {
                if *finished {
                    return None;
                }

                let num_workers = worker_manager.num_workers();

                // Keep up to `prefetch_factor` batches in flight per worker
                while *pending_tasks < config.prefetch_factor * num_workers {
                    let Some(indices) = batch_indices.next() else {
                        break;
                    };
                    // Round-robin assignment keeps each worker's RNG stream reproducible
                    let assigned_worker = *batch_index % num_workers;
                    if let Err(e) = worker_manager.send_task_to_worker(assigned_worker, indices) {
                        *finished = true;
                        return Some(Err(e.context(format!(
                            "Failed to send batch {} to worker {}",
                            *batch_index, assigned_worker
                        ))));
                    }
                    *batch_index += 1;
                    *pending_tasks += 1;
                }

                if *pending_tasks == 0 {
                    worker_manager.end_epoch();
                    *finished = true;
                    return None;
                }

                match worker_manager.receive_task_result(config.timeout) {
                    Ok(result) => {
                        *pending_tasks -= 1;
                        Some(result)
                    }
                    Err(e) => {
                        warn!(pending = *pending_tasks, "giving up on workers: {}", e);
                        *finished = true;
                        Some(Err(e.context(format!(
                            "Failed to receive batch from workers after {:?} \
                            (pending tasks: {})",
                            config.timeout, *pending_tasks
                        ))))
                    }
                }
            }
        }
    }
}
