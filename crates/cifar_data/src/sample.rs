use anyhow::{anyhow, Result};
use std::collections::HashMap;
use tch::Tensor;

/// Feature name under which image pipelines store the `[C, H, W]` pixel tensor.
pub const PIXEL_VALUES: &str = "pixel_values";

/// Feature name under which image pipelines store the integer class label.
pub const LABELS: &str = "labels";

/// The `Sample` struct represents a single labeled example in the pipeline.
///
/// It maps feature names to tensors. For CIFAR-10 every sample carries:
/// - `"pixel_values"`: float tensor of shape `[3, 32, 32]`
/// - `"labels"`: scalar int64 tensor holding the class index
#[derive(Debug)]
pub struct Sample {
    pub features: HashMap<String, Tensor>,
}

/// Creates a shallow clone of the `Sample` (tensor storage is shared).
impl Clone for Sample {
    fn clone(&self) -> Self {
        let features = self
            .features
            .iter()
            .map(|(k, v)| (k.clone(), v.shallow_clone()))
            .collect();
        Self { features }
    }
}

/// Safety:
/// - `tch::Tensor` is `Send`, and `String`/`HashMap` compose only `Send` types.
/// - Samples are never mutated in place once handed to a dataset or collator,
///   so shared references can be read concurrently from worker threads.
unsafe impl Send for Sample {}
unsafe impl Sync for Sample {}

impl Sample {
    /// Creates a `Sample` from a single `(feature_name, tensor)` pair.
    ///
    /// Chain with [`with_feature`](Self::with_feature) to add more features.
    pub fn from_single(name: impl Into<String>, tensor: Tensor) -> Self {
        Self {
            features: HashMap::from([(name.into(), tensor)]),
        }
    }

    /// Adds or overwrites a feature in the `Sample`.
    pub fn with_feature(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.features.insert(name.into(), tensor);
        self
    }

    /// Returns a reference to the tensor by feature name.
    pub fn get(&self, feature: &str) -> Result<&Tensor> {
        self.features
            .get(feature)
            .ok_or_else(|| anyhow!("Feature {} not found", feature))
    }

    /// Returns an iterator over all feature names in this `Sample`.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }
}
