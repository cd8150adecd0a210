//! src/dataloader/config.rs
//!
//! Configuration for DataLoader behaviour
//!
//! Example:
//! ```ignore
//! let config = DataLoaderConfig::builder()
//!     .batch_size(128)
//!     .num_workers(4)
//!     .shuffle(true)
//!     .pin_memory(true)
//!     .build();
//! ```
//!
//! # Performance considerations:
//! - `num_workers`: More workers can improve throughput but increase memory usage
//! - `prefetch_factor`: Higher values reduce accelerator starvation but use more memory

use std::time::Duration;

/// Configuration for DataLoader
#[derive(Debug, Clone)]
pub struct DataLoaderConfig {
    /// Number of samples per batch (defaults to 1 if not specified)
    pub batch_size: Option<usize>,
    /// Number of parallel workers (0 = single-threaded)
    pub num_workers: usize,
    /// Whether to drop the last incomplete batch (defaults to false if not specified)
    pub drop_last: Option<bool>,
    /// Whether to shuffle data each epoch (defaults to false if not specified)
    pub shuffle: Option<bool>,
    /// Random seed for reproducible shuffling and transforms
    pub seed: Option<u64>,
    /// Number of batches in flight per worker (must be >0 when using workers)
    pub prefetch_factor: usize,
    /// Maximum time to wait for a complete batch from workers. Default: 30s
    pub timeout: Duration,
    /// How often idle workers check for shutdown signal. Default: 100ms.
    pub worker_timeout: Duration,
    /// Place finished batches in page-locked memory for faster host-to-device copies.
    pub pin_memory: bool,
}

impl Default for DataLoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            num_workers: 0,
            drop_last: None,
            shuffle: None,
            seed: None,
            prefetch_factor: 2,
            timeout: Duration::from_secs(30),
            worker_timeout: Duration::from_millis(100),
            pin_memory: false,
        }
    }
}

impl DataLoaderConfig {
    pub fn builder() -> DataLoaderConfigBuilder {
        DataLoaderConfigBuilder::default()
    }
}

/// Builder for DataLoaderConfig with method chaining
#[derive(Default)]
pub struct DataLoaderConfigBuilder {
    config: DataLoaderConfig,
}

impl DataLoaderConfigBuilder {
    /// Set the batch size (must be > 0)
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = Some(size);
        self
    }

    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = workers;
        self
    }

    pub fn drop_last(mut self, drop: bool) -> Self {
        self.config.drop_last = Some(drop);
        self
    }

    /// Set whether to reshuffle the dataset every epoch
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = Some(shuffle);
        self
    }

    /// Set the random seed for reproducible data loading.
    ///
    /// When set, this seed controls:
    /// - Data shuffling (if shuffle = true)
    /// - Random transforms in workers
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn prefetch_factor(mut self, factor: usize) -> Self {
        self.config.prefetch_factor = factor;
        self
    }

    /// Set the timeout for batch operations.
    ///
    /// - Too low: May cancel batches during legitimate heavy processing
    /// - Too high: Delays detection of stuck workers.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the worker polling interval
    pub fn worker_timeout(mut self, worker_timeout: Duration) -> Self {
        self.config.worker_timeout = worker_timeout;
        self
    }

    pub fn pin_memory(mut self, pin: bool) -> Self {
        self.config.pin_memory = pin;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> DataLoaderConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = DataLoaderConfig::builder()
            .batch_size(64)
            .num_workers(3)
            .shuffle(true)
            .seed(7)
            .pin_memory(true)
            .build();

        assert_eq!(config.batch_size, Some(64));
        assert_eq!(config.num_workers, 3);
        assert_eq!(config.shuffle, Some(true));
        assert_eq!(config.seed, Some(7));
        assert!(config.pin_memory);
        assert_eq!(config.prefetch_factor, 2);
        assert!(config.drop_last.is_none());
    }
}
