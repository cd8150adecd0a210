use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use tch::{Kind, Tensor};

// ============================================================================
// ToTensor
// ============================================================================

/// Converts an image to a channel-first f32 tensor in [0.0, 1.0] range.
///
/// Channel Handling
/// | Input Format  | Output Shape |
/// |---------------|--------------|
/// | Grayscale (L) | `[1, H, W]`  |
/// | RGB           | `[3, H, W]`  |
/// | Other         | `[3, H, W]`  |
///
/// The decoded buffers are interleaved (HWC), so the tensor is permuted to CHW.
///
/// # Example
/// ```ignore
/// let tensor = ToTensor.apply(image)?;
/// assert_eq!(tensor.size(), vec![3, 32, 32]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ToTensor;

impl Transform<DynamicImage, Tensor> for ToTensor {
    fn apply(&self, img: DynamicImage) -> Result<Tensor> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive (got {}x{})",
            width,
            height
        );
        let (h, w) = (height as i64, width as i64);

        let chw = match img {
            DynamicImage::ImageLuma8(img) => Tensor::from_slice(img.as_raw()).reshape([1, h, w]),
            DynamicImage::ImageRgb8(img) => Tensor::from_slice(img.as_raw())
                .reshape([h, w, 3])
                .permute([2, 0, 1]),
            // Everything else goes through RGB
            other => Tensor::from_slice(other.to_rgb8().as_raw())
                .reshape([h, w, 3])
                .permute([2, 0, 1]),
        };

        chw.contiguous()
            .to_kind(Kind::Float)
            .f_div_scalar(255.0)
            .context("Failed to scale tensor values to [0, 1]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn test_to_tensor_is_channel_first() -> Result<()> {
        // 2x1 image: left pixel pure red, right pixel pure blue
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 0, 255]));

        let tensor = ToTensor.apply(DynamicImage::ImageRgb8(img))?;
        assert_eq!(tensor.size(), vec![3, 1, 2]);
        assert_eq!(tensor.kind(), Kind::Float);

        assert_eq!(tensor.double_value(&[0, 0, 0]), 1.0); // red, left
        assert_eq!(tensor.double_value(&[0, 0, 1]), 0.0); // red, right
        assert_eq!(tensor.double_value(&[2, 0, 1]), 1.0); // blue, right
        Ok(())
    }

    #[test]
    fn test_to_tensor_grayscale() -> Result<()> {
        let img = image::GrayImage::from_pixel(4, 3, Luma([51]));
        let tensor = ToTensor.apply(DynamicImage::ImageLuma8(img))?;
        assert_eq!(tensor.size(), vec![1, 3, 4]);
        assert!((tensor.double_value(&[0, 2, 3]) - 0.2).abs() < 1e-6);
        Ok(())
    }
}
