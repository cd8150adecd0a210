use crate::dataloader::{DataLoader, DataLoaderConfig};
use crate::dataset::InMemoryDataset;
use crate::sample::PIXEL_VALUES;
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tch::Kind;
use tracing::info;

/// Per-channel normalization statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl ChannelStats {
    pub fn num_channels(&self) -> usize {
        self.mean.len()
    }

    /// Writes the statistics as JSON: `{ "mean": [...], "std": [...] }`.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)
            .with_context(|| format!("Failed to write statistics to '{}'", path.display()))
    }

    /// Reads statistics saved by [`to_json_file`](Self::to_json_file).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read statistics from '{}'", path.display()))?;
        let stats: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid statistics in '{}'", path.display()))?;
        ensure!(
            stats.mean.len() == stats.std.len(),
            "Statistics in '{}' have {} means but {} stds",
            path.display(),
            stats.mean.len(),
            stats.std.len()
        );
        Ok(stats)
    }
}

/// Estimates per-channel mean and standard deviation of `dataset`'s
/// `"pixel_values"` with one in-order, single-threaded pass.
///
/// For every batch of shape `[B, C, H, W]` the mean and population standard
/// deviation of each channel are taken over `B x H x W` values. The result
/// averages those per-batch figures with equal weight per batch, so a short
/// final batch counts as much as a full one. The averaged std is an
/// approximation of the dataset-wide std, not the exact value.
///
/// # Errors
/// - empty dataset or `batch_size == 0`
/// - a batch without `"pixel_values"`, or whose pixels are not 4-D
pub fn train_mean_std<Raw>(dataset: &InMemoryDataset<Raw>, batch_size: usize) -> Result<ChannelStats>
where
    Raw: Clone + Send + Sync + 'static,
{
    ensure!(batch_size > 0, "batch_size must be > 0 to compute statistics");
    ensure!(!dataset.is_empty(), "Cannot compute statistics of an empty dataset");

    let config = DataLoaderConfig::builder()
        .batch_size(batch_size)
        .shuffle(false)
        .num_workers(0)
        .build();
    let loader = DataLoader::new(dataset.clone(), config)?;

    let mut batch_means: Vec<Vec<f64>> = Vec::with_capacity(loader.len());
    let mut batch_stds: Vec<Vec<f64>> = Vec::with_capacity(loader.len());

    for (batch_index, batch) in loader.iter()?.enumerate() {
        let batch = batch.with_context(|| format!("Failed to load batch {}", batch_index))?;
        let pixels = batch.get(PIXEL_VALUES)?;
        let (_, channels, _, _) = pixels.size4().with_context(|| {
            format!(
                "Expected 4-D pixel batch [B, C, H, W], got shape {:?}",
                pixels.size()
            )
        })?;

        // [B, C, H, W] -> [C, B*H*W]
        let per_channel = pixels.transpose(0, 1).reshape([channels, -1]);
        let (means, stds): (Vec<f64>, Vec<f64>) = (0..channels)
            .map(|ch| {
                let values = per_channel.select(0, ch).to_kind(Kind::Double);
                (
                    values.mean(Kind::Double).double_value(&[]),
                    values.std(false).double_value(&[]),
                )
            })
            .unzip();

        if let Some(first) = batch_means.first() {
            ensure!(
                first.len() == means.len(),
                "Batch {} has {} channels, earlier batches had {}",
                batch_index,
                means.len(),
                first.len()
            );
        }
        batch_means.push(means);
        batch_stds.push(stds);
    }

    let stats = ChannelStats {
        mean: average_columns(&batch_means),
        std: average_columns(&batch_stds),
    };
    info!(mean = ?stats.mean, std = ?stats.std, batches = batch_means.len(), "computed channel statistics");
    Ok(stats)
}

fn average_columns(rows: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let count = rows.len() as f64;
    (0..first.len())
        .map(|col| rows.iter().map(|row| row[col]).sum::<f64>() / count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Sample, LABELS};
    use crate::transforms::Transform;
    use tch::{Device, Tensor};

    /// Each record is a constant fill value per channel.
    struct ConstantImage;
    impl Transform<[f32; 3], Sample> for ConstantImage {
        fn apply(&self, fill: [f32; 3]) -> Result<Sample> {
            let pixels = Tensor::from_slice(&fill)
                .reshape([3, 1, 1])
                .expand([3, 2, 2], false)
                .contiguous();
            Ok(Sample::from_single(PIXEL_VALUES, pixels).with_feature(LABELS, Tensor::from(0i64)))
        }
    }

    struct NoPixels;
    impl Transform<i64, Sample> for NoPixels {
        fn apply(&self, label: i64) -> Result<Sample> {
            Ok(Sample::from_single(LABELS, Tensor::from(label)))
        }
    }

    struct FlatPixels;
    impl Transform<i64, Sample> for FlatPixels {
        fn apply(&self, _: i64) -> Result<Sample> {
            Ok(Sample::from_single(
                PIXEL_VALUES,
                Tensor::zeros([4], (Kind::Float, Device::Cpu)),
            ))
        }
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_single_batch_matches_population_stats() -> Result<()> {
        let dataset = InMemoryDataset::new(vec![[0.0, 1.0, 0.5], [1.0, 1.0, 0.5]])
            .with_transform(ConstantImage);
        let stats = train_mean_std(&dataset, 2)?;

        assert_close(&stats.mean, &[0.5, 1.0, 0.5]);
        assert_close(&stats.std, &[0.5, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_batches_are_weighted_equally() -> Result<()> {
        // Batches: {0, 0} then {1}; per-batch means 0 and 1 average to 0.5,
        // while the exact dataset mean would be 1/3.
        let dataset = InMemoryDataset::new(vec![[0.0; 3], [0.0; 3], [1.0; 3]])
            .with_transform(ConstantImage);
        let stats = train_mean_std(&dataset, 2)?;

        assert_close(&stats.mean, &[0.5; 3]);
        assert_close(&stats.std, &[0.0; 3]);
        assert_eq!(stats.num_channels(), 3);
        Ok(())
    }

    #[test]
    fn test_is_deterministic() -> Result<()> {
        let fills: Vec<[f32; 3]> = (0..10)
            .map(|i| [i as f32 / 10.0, 1.0 - i as f32 / 10.0, (i % 3) as f32 / 3.0])
            .collect();
        let dataset = InMemoryDataset::new(fills).with_transform(ConstantImage);

        let first = train_mean_std(&dataset, 3)?;
        let second = train_mean_std(&dataset, 3)?;
        assert_eq!(first, second);
        assert!(first.std.iter().all(|&s| s >= 0.0));
        Ok(())
    }

    #[test]
    fn test_json_file_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("stats.json");
        let stats = ChannelStats {
            mean: vec![0.49, 0.48, 0.45],
            std: vec![0.2, 0.19, 0.2],
        };
        stats.to_json_file(&path)?;
        assert_eq!(ChannelStats::from_json_file(&path)?, stats);

        fs::write(&path, r#"{ "mean": [0.5, 0.5], "std": [0.1] }"#)?;
        assert!(ChannelStats::from_json_file(&path).is_err());
        assert!(ChannelStats::from_json_file(dir.path().join("missing.json")).is_err());
        Ok(())
    }

    #[test]
    fn test_rejects_bad_input() {
        let empty: InMemoryDataset<[f32; 3]> =
            InMemoryDataset::new(Vec::new()).with_transform(ConstantImage);
        assert!(train_mean_std(&empty, 4).is_err());

        let one = InMemoryDataset::new(vec![[0.0f32; 3]]).with_transform(ConstantImage);
        assert!(train_mean_std(&one, 0).is_err());

        let no_pixels = InMemoryDataset::new(vec![1i64, 2]).with_transform(NoPixels);
        assert!(train_mean_std(&no_pixels, 2).is_err());

        let flat = InMemoryDataset::new(vec![1i64, 2]).with_transform(FlatPixels);
        let err = train_mean_std(&flat, 2).unwrap_err();
        assert!(format!("{:#}", err).contains("4-D"));
    }
}
