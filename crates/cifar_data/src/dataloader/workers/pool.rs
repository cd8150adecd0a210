//! Worker pool implementation for parallel data loading.
//!
//! Manages worker lifecycle, task routing and result collection.
//!
//! # Key features
//! - Bounded channels prevent memory bloat
//! - Graceful shutdown on drop
//! - Thread-local worker IDs
//! - Per-worker task channels: the main thread decides which worker gets
//!   which task, so random transforms see the same RNG stream every run

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::dataloader::common::thread::WORKER_ID;

/// Thread pool for parallel data loading.
///
/// - Task channels: Main thread -> Worker `i` (one channel per worker)
/// - Output channel: Workers -> Main thread (shared)
/// - Shutdown flag: Enables graceful termination
pub(crate) struct WorkerPool<Task, Output> {
    workers: Vec<thread::JoinHandle<()>>,
    pub(crate) worker_task_txs: Vec<Sender<Task>>,
    pub(crate) output_rx: Receiver<Output>,
    shutdown: Arc<AtomicBool>,
}

impl<Task, Output> WorkerPool<Task, Output>
where
    Task: Send + 'static,
    Output: Send + 'static,
{
    /// Spawns `num_workers` threads, each with its own bounded task channel of
    /// capacity `buffer_size`.
    pub(crate) fn new_deterministic<F>(
        num_workers: usize,
        buffer_size: usize,
        worker_fn: F,
    ) -> Result<Self>
    where
        F: Fn(Receiver<Task>, Sender<Output>, Arc<AtomicBool>) + Send + Sync + 'static,
    {
        if num_workers == 0 {
            return Err(anyhow!(
                "Cannot create WorkerPool with 0 workers. \
                Either set num_workers > 0 or use single-threaded mode."
            ));
        }

        if buffer_size == 0 {
            return Err(anyhow!(
                "Cannot create WorkerPool with buffer_size 0. \
                Buffer size must be > 0 to prevent deadlocks."
            ));
        }

        let mut worker_task_txs = Vec::with_capacity(num_workers);
        let mut task_receivers = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let (tx, rx) = bounded(buffer_size);
            worker_task_txs.push(tx);
            task_receivers.push(rx);
        }

        let (output_tx, output_rx) = bounded(buffer_size * num_workers);

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_fn = Arc::new(worker_fn);
        let mut workers = Vec::with_capacity(num_workers);

        for (worker_id, task_rx) in task_receivers.into_iter().enumerate() {
            let output_tx = output_tx.clone();
            let shutdown_clone = shutdown.clone();
            let worker_fn_clone = worker_fn.clone();

            let handle = thread::Builder::new()
                .name(format!("dataloader-worker-{}", worker_id))
                .spawn(move || {
                    WORKER_ID.with(|id| *id.borrow_mut() = worker_id);
                    worker_fn_clone(task_rx, output_tx, shutdown_clone);
                })
                .with_context(|| format!("Failed to spawn worker thread {}", worker_id))?;

            workers.push(handle);
        }

        Ok(Self {
            workers,
            worker_task_txs,
            output_rx,
            shutdown,
        })
    }

    pub(crate) fn num_workers(&self) -> usize {
        self.worker_task_txs.len()
    }
}

impl<Task, Output> Drop for WorkerPool<Task, Output> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // Closing the task channels wakes workers blocked on recv
        self.worker_task_txs.clear();

        // Workers blocked on a full output channel need it drained to exit
        while self.output_rx.try_recv().is_ok() {}

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
