//! src/transforms/vision/mod.rs
//!
//! Vision transforms for image preprocessing and augmentation.
//!
//! ```text
//! transforms/vision/
//! ├── augmentation.rs  → Random flips and padded random crops
//! ├── conversion.rs    → Image → CHW float tensor
//! └── photometric.rs   → Per-channel normalization
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use crate::transforms::Transform;
//! use crate::transforms::vision::{Normalize, RandomCrop, RandomHorizontalFlip, ToTensor};
//!
//! let train = RandomCrop::new(32, 4)?
//!     .then(RandomHorizontalFlip::new(0.5)?)
//!     .then(ToTensor)
//!     .then(Normalize::from_stats(&stats)?);
//! let test = ToTensor.then(Normalize::from_stats(&stats)?);
//! ```

pub mod augmentation;
pub mod conversion;
pub mod photometric;

pub use augmentation::{RandomCrop, RandomHorizontalFlip};
pub use conversion::ToTensor;
pub use photometric::Normalize;
