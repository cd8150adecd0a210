//! Worker management for parallel data loading.
//!
//! - `pool`: Worker pool implementation
//! - `inmemory`: Workers that fetch, transform and collate indexed samples

pub(crate) mod inmemory;
pub(crate) mod pool;
