pub mod core;
pub mod labeled;
pub mod vision;

pub use self::core::{Chain, Transform};
pub use labeled::ImageClassificationPipeline;
