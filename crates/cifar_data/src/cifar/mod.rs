//! CIFAR-10: loading, subsetting and loader construction.
//!
//! The usual flow:
//!
//! ```ignore
//! let options = Cifar10Options::default();
//! let raw = load_raw(&options, None)?;                    // downloads if missing
//! let stats = train_mean_std(&raw.train, 256)?;
//!
//! let train_pipeline = ImageClassificationPipeline::new(
//!     RandomCrop::new(32, 4)?
//!         .then(RandomHorizontalFlip::new(0.5)?)
//!         .then(ToTensor)
//!         .then(Normalize::from_stats(&stats)?),
//! );
//! let test_pipeline =
//!     ImageClassificationPipeline::new(ToTensor.then(Normalize::from_stats(&stats)?));
//!
//! let (train, test) = load_transformed(&options, train_pipeline, test_pipeline, None)?;
//! let (train_loader, test_loader) = get_loaders(128, device, train, test)?;
//! ```

pub mod download;
pub mod error;
pub mod format;

pub use download::DEFAULT_URL;
pub use error::CifarError;
pub use format::ClassMapping;

use crate::dataloader::{DataLoader, DataLoaderConfig};
use crate::dataset::InMemoryDataset;
use crate::sample::Sample;
use crate::transforms::{ImageClassificationPipeline, Transform};
use crate::workers::num_workers;
use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tch::Device;
use tracing::{info, warn};

/// One decoded CIFAR-10 record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CifarImage {
    /// 32x32 RGB image
    pub image: RgbImage,
    /// Class index in `0..10`
    pub label: u8,
}

/// A CIFAR-10 partition.
pub type CifarDataset = InMemoryDataset<CifarImage>;

/// A batched iterator over a CIFAR-10 partition.
pub type CifarLoader = DataLoader<CifarDataset>;

/// Where the dataset lives and how to fetch it.
///
/// Reads from JSON with every field optional:
/// ```json
/// { "root": "/data/CIFAR10", "download": false }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cifar10Options {
    /// Directory holding (or receiving) `cifar-10-batches-bin/`
    pub root: PathBuf,
    /// Archive URL used when downloading
    pub url: String,
    /// Whether `load_raw` may download a missing dataset
    pub download: bool,
}

impl Default for Cifar10Options {
    fn default() -> Self {
        Self {
            root: PathBuf::from("CIFAR10"),
            url: DEFAULT_URL.to_string(),
            download: true,
        }
    }
}

impl Cifar10Options {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::default().root(root)
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read options from '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid CIFAR-10 options in '{}'", path.display()))
    }

    /// `<root>/cifar-10-batches-bin`
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(format::DATA_DIR)
    }
}

/// Both partitions with format conversion only, plus the class names.
#[derive(Debug, Clone)]
pub struct RawDatasets {
    pub train: CifarDataset,
    pub test: CifarDataset,
    pub class_to_idx: ClassMapping,
}

/// Loads both partitions with the [`ToTensor`](crate::transforms::vision::ToTensor)
/// pipeline, downloading the dataset first when it is missing and
/// `options.download` allows it.
///
/// When `indices` is given it restricts *both* partitions. Train and test
/// are unrelated sets of different sizes, so this is rarely what a caller
/// wants and a warning is logged. Each partition checks the indices against
/// its own length. See [`load_raw_with_subsets`] for separate subsets.
pub fn load_raw(options: &Cifar10Options, indices: Option<&[usize]>) -> Result<RawDatasets> {
    warn_if_shared_subset(indices);
    load_raw_with_subsets(options, indices, indices)
}

/// [`load_raw`] with an independent subset per partition.
pub fn load_raw_with_subsets(
    options: &Cifar10Options,
    train_indices: Option<&[usize]>,
    test_indices: Option<&[usize]>,
) -> Result<RawDatasets> {
    ensure_present(options)?;

    let pipeline: Arc<dyn Transform<CifarImage, Sample>> =
        Arc::new(ImageClassificationPipeline::to_tensor());
    let (train, test) = read_partitions(options, pipeline.clone(), pipeline)?;

    let class_to_idx = ClassMapping::from_meta_file(&options.data_dir().join(format::META_FILE))?;

    Ok(RawDatasets {
        train: restrict(train, train_indices, "train")?,
        test: restrict(test, test_indices, "test")?,
        class_to_idx,
    })
}

/// Loads both partitions from the local copy with caller-supplied pipelines.
///
/// Never downloads: a missing dataset fails with [`CifarError::NotFound`],
/// whatever `options.download` says. `indices` behaves as in [`load_raw`].
pub fn load_transformed<TR, TE>(
    options: &Cifar10Options,
    train_pipeline: TR,
    test_pipeline: TE,
    indices: Option<&[usize]>,
) -> Result<(CifarDataset, CifarDataset)>
where
    TR: Transform<CifarImage, Sample> + 'static,
    TE: Transform<CifarImage, Sample> + 'static,
{
    warn_if_shared_subset(indices);
    load_transformed_with_subsets(options, train_pipeline, test_pipeline, indices, indices)
}

/// [`load_transformed`] with an independent subset per partition.
pub fn load_transformed_with_subsets<TR, TE>(
    options: &Cifar10Options,
    train_pipeline: TR,
    test_pipeline: TE,
    train_indices: Option<&[usize]>,
    test_indices: Option<&[usize]>,
) -> Result<(CifarDataset, CifarDataset)>
where
    TR: Transform<CifarImage, Sample> + 'static,
    TE: Transform<CifarImage, Sample> + 'static,
{
    if !download::is_extracted(&options.root) {
        return Err(CifarError::NotFound {
            root: options.root.clone(),
        }
        .into());
    }

    let (train, test) = read_partitions(options, Arc::new(train_pipeline), Arc::new(test_pipeline))?;
    Ok((
        restrict(train, train_indices, "train")?,
        restrict(test, test_indices, "test")?,
    ))
}

/// Wraps the partitions in loaders sized for `device`.
///
/// Both use [`num_workers`] worker threads and pinned memory. The train
/// loader reshuffles every epoch; the test loader keeps dataset order.
pub fn get_loaders<Raw>(
    batch_size: usize,
    device: Device,
    train: InMemoryDataset<Raw>,
    test: InMemoryDataset<Raw>,
) -> Result<(DataLoader<InMemoryDataset<Raw>>, DataLoader<InMemoryDataset<Raw>>)>
where
    Raw: Clone + Send + Sync + 'static,
{
    let workers = num_workers(device);

    let train_config = DataLoaderConfig::builder()
        .batch_size(batch_size)
        .shuffle(true)
        .num_workers(workers)
        .pin_memory(true)
        .build();
    let test_config = DataLoaderConfig::builder()
        .batch_size(batch_size)
        .shuffle(false)
        .num_workers(workers)
        .pin_memory(true)
        .build();

    let train_loader = DataLoader::new(train, train_config).context("Failed to build train loader")?;
    let test_loader = DataLoader::new(test, test_config).context("Failed to build test loader")?;
    Ok((train_loader, test_loader))
}

fn ensure_present(options: &Cifar10Options) -> Result<()> {
    if download::is_extracted(&options.root) {
        return Ok(());
    }
    if !options.download {
        return Err(CifarError::NotFound {
            root: options.root.clone(),
        }
        .into());
    }
    info!(root = %options.root.display(), "CIFAR-10 not found locally");
    download::download_and_extract(&options.url, &options.root)
        .with_context(|| format!("Failed to fetch CIFAR-10 into '{}'", options.root.display()))
}

fn read_partitions(
    options: &Cifar10Options,
    train_pipeline: Arc<dyn Transform<CifarImage, Sample>>,
    test_pipeline: Arc<dyn Transform<CifarImage, Sample>>,
) -> Result<(CifarDataset, CifarDataset)> {
    let dir = options.data_dir();
    let train = format::read_partition(&dir, &format::TRAIN_FILES)
        .context("Failed to read CIFAR-10 train partition")?;
    let test = format::read_partition(&dir, &[format::TEST_FILE])
        .context("Failed to read CIFAR-10 test partition")?;
    info!(train = train.len(), test = test.len(), "loaded CIFAR-10");

    Ok((
        InMemoryDataset::new(train)
            .with_shared_transform(train_pipeline)
            .with_metadata("split", "train"),
        InMemoryDataset::new(test)
            .with_shared_transform(test_pipeline)
            .with_metadata("split", "test"),
    ))
}

fn restrict(dataset: CifarDataset, indices: Option<&[usize]>, split: &str) -> Result<CifarDataset> {
    match indices {
        Some(indices) => dataset
            .subset(indices)
            .with_context(|| format!("Invalid subset for the {} partition", split)),
        None => Ok(dataset),
    }
}

fn warn_if_shared_subset(indices: Option<&[usize]>) {
    if let Some(indices) = indices {
        warn!(
            len = indices.len(),
            "applying the same index subset to the train and test partitions"
        );
    }
}
