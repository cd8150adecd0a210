use crate::cifar::CifarImage;
use crate::sample::{Sample, LABELS, PIXEL_VALUES};
use crate::transforms::vision::ToTensor;
use crate::transforms::Transform;
use anyhow::{Context, Result};
use image::DynamicImage;
use tch::Tensor;

/// Turns a labeled CIFAR record into a [`Sample`].
///
/// # Type Parameters
/// - `V`: Image pipeline ending in a tensor (implements `Transform<DynamicImage, Tensor>`)
///
/// Processes a record by:
/// 1. Running `image_pipeline` on the record's image
/// 2. Storing the result under `"pixel_values"`
/// 3. Storing the class index as a scalar int64 under `"labels"`
///
/// # Example
/// ```ignore
/// let train_pipeline = ImageClassificationPipeline::new(
///     RandomCrop::new(32, 4)?
///         .then(RandomHorizontalFlip::new(0.5)?)
///         .then(ToTensor)
///         .then(Normalize::from_stats(&stats)?),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ImageClassificationPipeline<V> {
    image_pipeline: V,
}

impl<V> ImageClassificationPipeline<V> {
    pub fn new(image_pipeline: V) -> Self {
        Self { image_pipeline }
    }
}

impl ImageClassificationPipeline<ToTensor> {
    /// Format conversion only: pixels scaled to [0, 1], no augmentation or normalization.
    pub fn to_tensor() -> Self {
        Self::new(ToTensor)
    }
}

impl<V> Transform<CifarImage, Sample> for ImageClassificationPipeline<V>
where
    V: Transform<DynamicImage, Tensor>,
{
    fn apply(&self, input: CifarImage) -> Result<Sample> {
        let label = i64::from(input.label);
        let pixels = self
            .image_pipeline
            .apply(DynamicImage::ImageRgb8(input.image))
            .with_context(|| format!("Image pipeline failed for record with label {}", label))?;
        Ok(Sample::from_single(PIXEL_VALUES, pixels).with_feature(LABELS, Tensor::from(label)))
    }
}
