use std::path::PathBuf;
use thiserror::Error;

/// Failures a caller may want to tell apart from generic I/O errors.
///
/// Surfaced wrapped in `anyhow::Error`; recover with `err.downcast_ref::<CifarError>()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CifarError {
    /// Missing, or present but incomplete (see [`is_extracted`](super::download::is_extracted)).
    #[error("CIFAR-10 dataset not found or damaged under '{}'. Load it once with downloading enabled.", root.display())]
    NotFound { root: PathBuf },

    #[error("'{}' is truncated: {len} bytes is not a whole number of {record_size}-byte records", path.display())]
    Truncated {
        path: PathBuf,
        len: usize,
        record_size: usize,
    },

    #[error("Record {record} in '{}' has label {label}, but only {num_classes} classes exist", path.display())]
    BadLabel {
        path: PathBuf,
        record: usize,
        label: u8,
        num_classes: usize,
    },
}
