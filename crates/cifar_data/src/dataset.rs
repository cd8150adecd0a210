use crate::sample::Sample;
use crate::transforms::Transform;
use anyhow::{anyhow, ensure, Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A dataset that keeps all raw records in contiguous memory
/// with atomic reference counting (`Arc<[Raw]>`).
///
/// Records stay in their raw form (e.g. a decoded CIFAR image plus its
/// label) and the attached transform turns one into a [`Sample`] on demand,
/// so random augmentations run fresh every time a record is fetched.
///
/// This enables:
/// - Zero-copy clone: cloning only bumps `Arc` counters
/// - Thread-safe sharing: workers read the same records concurrently
/// - Cheap subsetting: [`subset`](Self::subset) builds a view over the same records
#[derive(Clone)]
pub struct InMemoryDataset<Raw> {
    records: Arc<[Raw]>,
    indices: Option<Arc<[usize]>>,
    transform: Option<Arc<dyn Transform<Raw, Sample>>>,
    metadata: HashMap<String, String>,
}

impl<Raw> fmt::Debug for InMemoryDataset<Raw> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDataset")
            .field("records", &self.records.len())
            .field("subset_len", &self.indices.as_ref().map(|i| i.len()))
            .field("has_transform", &self.transform.is_some())
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl<Raw> InMemoryDataset<Raw>
where
    Raw: Clone + Send + Sync + 'static,
{
    /// Creates a new in-memory dataset from a vector of raw records.
    pub fn new(records: Vec<Raw>) -> Self {
        Self {
            records: records.into(),
            indices: None,
            transform: None,
            metadata: HashMap::new(),
        }
    }

    /// Attaches the transform that converts raw records into samples,
    /// replacing any previous one.
    pub fn with_transform<T>(self, transform: T) -> Self
    where
        T: Transform<Raw, Sample> + 'static,
    {
        self.with_shared_transform(Arc::new(transform))
    }

    /// Same as [`with_transform`](Self::with_transform) for a pipeline that is already shared.
    pub fn with_shared_transform(mut self, transform: Arc<dyn Transform<Raw, Sample>>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Adds/updates metadata and returns the modified dataset.
    /// Enables chaining: `dataset.with_metadata("split", "train")`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the value of a metadata field, if it exists.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    /// Restricts the dataset to `indices`.
    ///
    /// Position `i` of the returned view is position `indices[i]` of `self`.
    /// Underlying records are shared, not copied or renumbered. Nested
    /// subsets compose. Every index must be in bounds; duplicates are allowed.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        let len = self.len();
        if let Some(&bad) = indices.iter().find(|&&index| index >= len) {
            return Err(anyhow!(
                "Subset index {} out of bounds for dataset of size {}",
                bad,
                len
            ));
        }

        let resolved: Vec<usize> = match &self.indices {
            Some(current) => indices.iter().map(|&i| current[i]).collect(),
            None => indices.to_vec(),
        };

        Ok(Self {
            records: self.records.clone(),
            indices: Some(resolved.into()),
            transform: self.transform.clone(),
            metadata: self.metadata.clone(),
        })
    }

    /// Number of records visible through this dataset (after subsetting).
    pub fn len(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maps a position of this view to the position in the full record store.
    pub fn base_index(&self, index: usize) -> Option<usize> {
        match &self.indices {
            Some(indices) => indices.get(index).copied(),
            None => (index < self.records.len()).then_some(index),
        }
    }

    /// Random-access lookup of the raw record. `None` if out of bounds.
    pub fn get(&self, index: usize) -> Option<&Raw> {
        self.base_index(index).map(|base| &self.records[base])
    }

    /// Fetches the record at `index` and runs it through the transform.
    pub fn get_sample(&self, index: usize) -> Result<Sample> {
        let raw = self
            .get(index)
            .ok_or_else(|| {
                anyhow!(
                    "Index {} out of bounds for dataset of size {}",
                    index,
                    self.len()
                )
            })?
            .clone();

        let transform = self.transform.as_ref().ok_or_else(|| {
            anyhow!("No transform attached; call `with_transform` before fetching samples")
        })?;

        transform
            .apply(raw)
            .with_context(|| format!("Transform failed for sample {}", index))
    }

    /// Iterates over every sample in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Sample>> + '_ {
        (0..self.len()).map(move |index| self.get_sample(index))
    }

    /// Checks that a transform is attached. Used by the data loader before
    /// spawning workers so the error surfaces on construction.
    pub(crate) fn ensure_transform(&self) -> Result<()> {
        ensure!(
            self.transform.is_some(),
            "Dataset has no transform; attach one with `with_transform`"
        );
        Ok(())
    }
}
