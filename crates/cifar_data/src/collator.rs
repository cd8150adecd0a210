use crate::minibatch::MiniBatch;
use crate::sample::Sample;
use anyhow::{anyhow, bail, Result};
use std::collections::{HashMap, HashSet};
use tch::Tensor;

/// A `Collator` defines how to combine multiple [`Sample`]s into a [`MiniBatch`].
pub trait Collator {
    fn collate(&self, samples: &[Sample]) -> Result<MiniBatch>;
}

/// A `Collator` that stacks tensors with identical shapes along a new
/// batch dimension (dim 0). Scalar features such as class labels become
/// a 1-D tensor of length `batch_size`.
///
/// Samples with mismatched feature keys or shapes are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackCollator;

impl Collator for StackCollator {
    fn collate(&self, samples: &[Sample]) -> Result<MiniBatch> {
        if samples.is_empty() {
            bail!("Cannot collate empty sample list");
        }

        // Validate feature keys
        let first_keys: HashSet<&String> = samples[0].features.keys().collect();
        for (i, sample) in samples.iter().enumerate().skip(1) {
            let missing_keys: Vec<&String> = first_keys
                .iter()
                .filter(|&&k| !sample.features.contains_key(k))
                .cloned()
                .collect();

            let extra_keys: Vec<&String> = sample
                .features
                .keys()
                .filter(|k| !first_keys.contains(k))
                .collect();

            if !missing_keys.is_empty() || !extra_keys.is_empty() {
                bail!(
                    "Sample #{} has mismatch feature keys:\n -Missing: {:?}\n -Extra: {:?}",
                    i,
                    missing_keys,
                    extra_keys
                )
            }
        }

        let mut tensors = HashMap::with_capacity(first_keys.len());
        for key in first_keys {
            let tensors_to_stack = samples
                .iter()
                .map(|s| {
                    s.features
                        .get(key)
                        .ok_or_else(|| anyhow!("Feature '{}' vanished during collation", key))
                })
                .collect::<Result<Vec<&Tensor>>>()?;

            let reference_shape = tensors_to_stack[0].size();
            for (i, tensor) in tensors_to_stack.iter().enumerate() {
                if tensor.size() != reference_shape {
                    bail!(
                        "Shape mismatch in sample {} for feature '{}': expected {:?}, got {:?}",
                        i,
                        key,
                        reference_shape,
                        tensor.size()
                    );
                }
            }

            let stacked = Tensor::stack(&tensors_to_stack, 0);
            tensors.insert(key.clone(), stacked);
        }
        Ok(MiniBatch { tensors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{LABELS, PIXEL_VALUES};
    use tch::{Device, Kind};

    #[test]
    fn stacks_images_and_scalar_labels() -> Result<()> {
        let samples: Vec<Sample> = (0..4)
            .map(|i| {
                Sample::from_single(
                    PIXEL_VALUES,
                    Tensor::full([3, 8, 8], i as f64, (Kind::Float, Device::Cpu)),
                )
                .with_feature(LABELS, Tensor::from(i as i64))
            })
            .collect();

        let batch = StackCollator.collate(&samples)?;
        assert_eq!(batch.get(PIXEL_VALUES)?.size(), vec![4, 3, 8, 8]);
        assert_eq!(batch.get(LABELS)?.size(), vec![4]);
        assert_eq!(batch.get(PIXEL_VALUES)?.double_value(&[2, 1, 7, 7]), 2.0);
        assert_eq!(batch.get(LABELS)?.int64_value(&[3]), 3);
        Ok(())
    }

    #[test]
    fn rejects_key_mismatch() {
        let s1 = Sample::from_single(PIXEL_VALUES, Tensor::from(1.0f32));
        let s2 = Sample::from_single(LABELS, Tensor::from(0i64));
        let err = StackCollator.collate(&[s1, s2]).unwrap_err();
        assert!(err.to_string().contains("mismatch feature keys"));
    }
}
