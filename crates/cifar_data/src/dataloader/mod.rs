//! src/dataloader/mod.rs
//!
//! This module implements the `DataLoader`.
//!
//! The `DataLoader` coordinates the dataset, the sampler and the collator to
//! load and batch data for training, optionally across worker threads.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌─────────────────┐
//!                 │ InMemoryDataset │ raw records + transform (Raw → Sample)
//!                 └────────┬────────┘
//!                          │
//!                     ┌─────────┐
//!                     │ Sampler │ sequential or per-epoch shuffle, batched
//!                     └────┬────┘
//!                          │ batch indices
//!                   ┌──────────────┐
//!                   │  DataLoader  │ ←───── DataLoaderConfig
//!                   └──────┬───────┘
//!                          │
//!                  [Worker Threads] fresh pool per epoch (optional)
//!                          │ fetch + transform samples
//!                     ┌──────────┐
//!                     │ Collator │ stack along dim 0
//!                     └────┬─────┘
//!                          │
//!                    ┌───────────┐
//!                    │ MiniBatch │ optionally pinned
//!                    └───────────┘
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/dataloader/
//! ├── mod.rs             # Public API exports
//! ├── config.rs          # DataLoaderConfig and builder
//! ├── loader.rs          # DataLoader struct and constructors
//! ├── iterator/
//! │   ├── mod.rs         # DataLoaderIter and the per-batch logic
//! │   └── inmemory.rs    # DataLoader::iter()
//! ├── workers/
//! │   ├── pool.rs        # Generic `WorkerPool<Task, Output>`
//! │   └── inmemory.rs    # InMemoryWorkerManager and task types
//! └── common/
//!     └── thread.rs      # Thread-local worker ID and RNG
//! ```
//!
//! # Example Usage
//!
//! ```ignore
//! let config = DataLoaderConfig::builder()
//!     .batch_size(128)
//!     .num_workers(4)
//!     .shuffle(true)
//!     .seed(42)
//!     .build();
//!
//! let dataloader = DataLoader::new(dataset, config)?;
//! for batch in dataloader.iter()? {
//!     let batch: MiniBatch = batch?;
//!     let images = batch.get("pixel_values")?;
//! }
//! ```
//!
//! # Memory Usage
//! - Single-threaded: O(batch_size)
//! - Multi-threaded: O(num_workers x prefetch_factor x batch_size)

mod common;
mod config;
mod iterator;
mod loader;
mod workers;

pub use config::{DataLoaderConfig, DataLoaderConfigBuilder};
pub use iterator::DataLoaderIter;
pub use loader::DataLoader;

pub use common::thread::{
    init_worker_rng, worker_gen_bool, worker_gen_range, WORKER_ID, WORKER_RNG,
};
