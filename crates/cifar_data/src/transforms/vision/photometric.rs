use crate::stats::ChannelStats;
use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use tch::Tensor;

// ============================================================================
// Normalize
// ============================================================================

/// Normalizes tensors using channel-wise statistics.
///
/// # Arguments:
/// - `mean`: per-channel means
/// - `std`: per-channel standard deviation.
/// The dimensions of mean and std should match the input tensor's
/// number of channels.
///
/// # Mathematical Operation:
/// ```text
/// output[c,h,w] = (input[c,h,w] - mean[c]) / std[c]
/// ```
///
/// # Example
/// ```ignore
/// let stats = train_mean_std(&raw.train, 256)?;
/// let norm = Normalize::from_stats(&stats)?;
/// let normalized = norm.apply(tensor)?;
/// ```
#[derive(Debug, Clone)]
pub struct Normalize {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Normalize {
    /// Creates new normalization parameters.
    pub fn new(mean: &[f32], std: &[f32]) -> Result<Self> {
        ensure!(!mean.is_empty(), "Normalization mean cannot be empty");
        ensure!(
            mean.len() == std.len(),
            "The mean and standard deviation for normalization must match in dimension. \
            The dimension of mean is {} but the dimension of std is {}.",
            mean.len(),
            std.len()
        );
        ensure!(
            std.iter().all(|&s| s > 0.0 && s.is_finite()),
            "Standard deviations must be positive and finite (got {:?})",
            std
        );
        Ok(Self {
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }

    /// Builds the transform from statistics computed over a training partition.
    pub fn from_stats(stats: &ChannelStats) -> Result<Self> {
        let mean: Vec<f32> = stats.mean.iter().map(|&m| m as f32).collect();
        let std: Vec<f32> = stats.std.iter().map(|&s| s as f32).collect();
        Self::new(&mean, &std)
    }

    /// Commonly quoted CIFAR-10 training-set statistics.
    pub fn cifar10() -> Self {
        Self {
            mean: vec![0.4914, 0.4822, 0.4465],
            std: vec![0.2470, 0.2435, 0.2616],
        }
    }
}

impl Transform<Tensor, Tensor> for Normalize {
    fn apply(&self, tensor: Tensor) -> Result<Tensor> {
        let (num_channels, _height, _width) = tensor
            .size3()
            .context("Input must be 3D tensor [C, H, W]")?;

        ensure!(
            num_channels as usize == self.mean.len(),
            "Channel count mismatch: input has {} channels but normalization expects {}",
            num_channels,
            self.mean.len()
        );

        let mean_t = Tensor::from_slice(&self.mean)
            .reshape([num_channels, 1, 1])
            .to_kind(tensor.kind());

        let std_t = Tensor::from_slice(&self.std)
            .reshape([num_channels, 1, 1])
            .to_kind(tensor.kind());

        Ok((tensor - mean_t) / std_t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind, Tensor};

    #[test]
    fn test_normalize() -> Result<()> {
        let tensor = Tensor::ones([3, 32, 32], (Kind::Float, Device::Cpu));
        let norm = Normalize::new(&[1.0; 3], &[1.0; 3])?;

        let normalized = norm.apply(tensor)?;
        for c in 0..3 {
            let channel_mean = normalized.select(0, c).mean(Kind::Float);
            assert!(channel_mean.double_value(&[]).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_normalize_from_stats() -> Result<()> {
        let stats = ChannelStats {
            mean: vec![0.5, 0.25, 0.0],
            std: vec![0.5, 0.25, 2.0],
        };
        let norm = Normalize::from_stats(&stats)?;
        let out = norm.apply(Tensor::ones([3, 2, 2], (Kind::Float, Device::Cpu)))?;

        assert!((out.double_value(&[0, 0, 0]) - 1.0).abs() < 1e-6);
        assert!((out.double_value(&[1, 1, 1]) - 3.0).abs() < 1e-6);
        assert!((out.double_value(&[2, 0, 1]) - 0.5).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_normalize_rejects_bad_parameters() {
        assert!(Normalize::new(&[], &[]).is_err());
        assert!(Normalize::new(&[0.5, 0.5], &[0.5]).is_err());
        assert!(Normalize::new(&[0.5], &[0.0]).is_err());

        let norm = Normalize::cifar10();
        let grayscale = Tensor::ones([1, 4, 4], (Kind::Float, Device::Cpu));
        assert!(norm.apply(grayscale).is_err());
    }
}
