//! CIFAR-10 data preparation on top of `tch`.
//!
//! - [`cifar`]: fetch, decode and subset the dataset; build loaders
//! - [`stats`]: per-channel mean / std for normalization
//! - [`workers`]: worker-thread count per device
//! - [`transforms`], [`dataset`], [`sampler`], [`collator`], [`dataloader`]:
//!   the general data-loading layer underneath

pub mod cifar;
pub mod collator;
pub mod dataloader;
pub mod dataset;
pub mod minibatch;
pub mod sample;
pub mod sampler;
pub mod stats;
pub mod transforms;
pub mod workers;

pub use cifar::{
    get_loaders, load_raw, load_raw_with_subsets, load_transformed,
    load_transformed_with_subsets, Cifar10Options, CifarDataset, CifarError, CifarImage,
    CifarLoader, ClassMapping, RawDatasets,
};
pub use collator::{Collator, StackCollator};
pub use dataloader::{DataLoader, DataLoaderConfig};
pub use dataset::InMemoryDataset;
pub use minibatch::MiniBatch;
pub use sample::{Sample, LABELS, PIXEL_VALUES};
pub use stats::{train_mean_std, ChannelStats};
pub use transforms::Transform;
pub use workers::{num_workers, num_workers_for, parse_device};
