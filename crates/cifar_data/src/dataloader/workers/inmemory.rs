//! src/dataloader/workers/inmemory.rs
//!
//! Worker implementation for InMemoryDataset.
//!
//! Workers fetch transformed data (`Sample`s) on demand using indices
//! and collate them into mini-batches.
//!
//! # Architecture:
//! - Workers share the dataset via `Arc` for zero-copy access.
//! - Tasks are routed round-robin through per-worker channels.
//! - A fresh pool is spawned for every epoch; each worker seeds its RNG
//!   from `(worker_id, epoch, base_seed)` once at startup.

use crate::collator::Collator;
use crate::dataset::InMemoryDataset;
use crate::minibatch::MiniBatch;
use crate::sample::Sample;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::pool::WorkerPool;
use crate::dataloader::common::thread::{init_worker_rng, WORKER_ID};
use crate::dataloader::config::DataLoaderConfig;

/// Task types for in-memory worker communication.
#[derive(Debug)]
pub(crate) enum InMemoryWorkerTask {
    /// Fetch, transform and collate these dataset positions
    Batch(Vec<usize>),
    /// No more batches this epoch
    EndEpoch,
}

/// Manages the workers for one epoch over an in-memory dataset.
pub(crate) struct InMemoryWorkerManager {
    worker_pool: WorkerPool<InMemoryWorkerTask, Result<MiniBatch>>,
}

impl InMemoryWorkerManager {
    /// Spawns `config.num_workers` workers for `epoch`.
    pub(crate) fn spawn<Raw, C>(
        dataset: Arc<InMemoryDataset<Raw>>,
        collator: C,
        config: &DataLoaderConfig,
        epoch: usize,
        base_seed: u64,
    ) -> Result<Self>
    where
        Raw: Clone + Send + Sync + 'static,
        C: Collator + Clone + Send + Sync + 'static,
    {
        let worker_timeout = config.worker_timeout;
        let pin_memory = config.pin_memory;

        let worker_pool = WorkerPool::new_deterministic(
            config.num_workers,
            config.prefetch_factor,
            move |task_rx: Receiver<InMemoryWorkerTask>,
                  output_tx: Sender<Result<MiniBatch>>,
                  shutdown| {
                let worker_id = WORKER_ID.with(|id| *id.borrow());
                init_worker_rng(worker_id, epoch, base_seed);

                while !shutdown.load(Ordering::Relaxed) {
                    match task_rx.recv_timeout(worker_timeout) {
                        Ok(InMemoryWorkerTask::Batch(indices)) => {
                            let result =
                                Self::process_batch_lazy(&dataset, &indices, &collator, pin_memory)
                                    .with_context(|| {
                                        format!(
                                            "Worker {} failed to process batch with {} indices",
                                            worker_id,
                                            indices.len()
                                        )
                                    });
                            if output_tx.send(result).is_err() {
                                break;
                            }
                        }
                        Ok(InMemoryWorkerTask::EndEpoch) => break,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            },
        )
        .context("Failed to create worker pool for in-memory dataset")?;

        Ok(Self { worker_pool })
    }

    pub(crate) fn num_workers(&self) -> usize {
        self.worker_pool.num_workers()
    }

    /// Fetches samples on demand by index and collates them.
    ///
    /// Shared by the worker threads and the single-threaded path.
    pub(crate) fn process_batch_lazy<Raw, C>(
        dataset: &InMemoryDataset<Raw>,
        indices: &[usize],
        collator: &C,
        pin_memory: bool,
    ) -> Result<MiniBatch>
    where
        Raw: Clone + Send + Sync + 'static,
        C: Collator,
    {
        let samples = indices
            .iter()
            .map(|&index| {
                dataset.get_sample(index).with_context(|| {
                    format!(
                        "Failed to load sample at index {} (dataset size: {})",
                        index,
                        dataset.len()
                    )
                })
            })
            .collect::<Result<Vec<Sample>>>()?;

        let batch = collator
            .collate(&samples)
            .with_context(|| format!("Failed to collate batch of {} samples", samples.len()))?;

        if pin_memory {
            batch.pin_memory()
        } else {
            Ok(batch)
        }
    }

    /// Sends a batch of indices to one worker. Blocks while that worker's queue is full.
    pub(crate) fn send_task_to_worker(&self, worker_id: usize, indices: Vec<usize>) -> Result<()> {
        let worker_tx = self
            .worker_pool
            .worker_task_txs
            .get(worker_id)
            .ok_or_else(|| anyhow!("No worker with id {}", worker_id))?;

        worker_tx
            .send(InMemoryWorkerTask::Batch(indices))
            .map_err(|_| anyhow!("Worker {} channel closed", worker_id))
    }

    /// Receives a processed MiniBatch from the worker pool.
    /// Blocks until a result is available or timeout occurs.
    pub(crate) fn receive_task_result(&self, timeout: Duration) -> Result<Result<MiniBatch>> {
        self.worker_pool
            .output_rx
            .recv_timeout(timeout)
            .map_err(|e| match e {
                RecvTimeoutError::Timeout => anyhow!(
                    "Worker timeout after {:?} - possible deadlock or slow data loading",
                    timeout
                ),
                RecvTimeoutError::Disconnected => {
                    anyhow!("Worker channel disconnected - workers may have crashed")
                }
            })
    }

    /// Tells every worker the epoch is over. Workers exit after their current task.
    pub(crate) fn end_epoch(&self) {
        for tx in &self.worker_pool.worker_task_txs {
            let _ = tx.send(InMemoryWorkerTask::EndEpoch);
        }
    }
}
