use crate::collator::Collator;
use crate::sample::Sample;
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use tch::{Cuda, Device, Tensor};

/// The `MiniBatch` struct represents a batch of samples grouped for model input.
///
/// It is constructed by stacking multiple [`Sample`]s together along the
/// batch dimension (dim 0). Each tensor in the map has shape `[batch_size, ...]`.
///
/// # Example
/// With a batch of 4 CIFAR-10 samples:
/// - `"pixel_values"` -> shape `[4, 3, 32, 32]`
/// - `"labels"` -> shape `[4]`
#[derive(Debug)]
pub struct MiniBatch {
    pub tensors: HashMap<String, Tensor>,
}

impl MiniBatch {
    /// Constructs a `MiniBatch` by applying the given [`Collator`] to a
    /// list of individual [`Sample`]s.
    ///
    /// Example:
    /// // Stack-only default
    /// let batch = MiniBatch::collate(samples, StackCollator);
    pub fn collate(samples: Vec<Sample>, collator: impl Collator) -> Result<Self> {
        collator.collate(&samples)
    }

    /// Returns the number of samples in the batch.
    pub fn batch_size(&self) -> Result<i64> {
        self.tensors
            .values()
            .next()
            .map(|t| t.size()[0])
            .ok_or(anyhow!("Empty mini-batch"))
    }

    /// Returns a reference to the tensor for a given feature key.
    pub fn get(&self, feature: &str) -> Result<&Tensor> {
        self.tensors
            .get(feature)
            .ok_or_else(|| anyhow!("Feature '{}' not found in mini-batch", feature))
    }

    /// Returns an iterator over all feature keys in the batch.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    /// Transfers all tensors to the target device (CPU/GPU)
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            tensors: self
                .tensors
                .iter()
                .map(|(feature_name, tensor)| (feature_name.clone(), tensor.to_device(device)))
                .collect(),
        }
    }

    /// Moves every tensor into page-locked host memory so a later copy to an
    /// accelerator can run asynchronously.
    ///
    /// Pinning needs a CUDA runtime; without one the batch is returned as-is.
    pub fn pin_memory(self) -> Result<Self> {
        if !Cuda::is_available() {
            return Ok(self);
        }
        let tensors = self
            .tensors
            .into_iter()
            .map(|(feature_name, tensor)| {
                let pinned = tensor
                    .f_pin_memory(Device::Cuda(0))
                    .with_context(|| format!("Failed to pin feature '{}'", feature_name))?;
                Ok((feature_name, pinned))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { tensors })
    }
}
