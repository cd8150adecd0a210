use crate::dataloader::{worker_gen_bool, worker_gen_range};
use crate::transforms::Transform;
use anyhow::{bail, ensure, Result};
use image::{imageops, DynamicImage, GenericImageView, RgbImage};

// ============================================================================
// RandomHorizontalFlip
// ============================================================================

/// Randomly mirrors images left-to-right.
///
/// Draws from the worker's thread-local RNG, so the flip decisions are
/// reproducible when the data loader is seeded.
///
/// # Example
/// ```ignore
/// let flip = RandomHorizontalFlip::new(0.5)?; // 50% flip chance
/// let augmented = flip.apply(image)?;
/// ```
#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    p: f64,
}

impl RandomHorizontalFlip {
    pub fn new(p: f64) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&p),
            "Probability must be in [0.0, 1.0] range (got {})",
            p
        );
        Ok(Self { p })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomHorizontalFlip {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let flip = match self.p {
            p if p <= 0.0 => false,
            p if p >= 1.0 => true,
            p => worker_gen_bool(p),
        };
        Ok(if flip { img.fliph() } else { img })
    }
}

// ============================================================================
// RandomCrop
// ============================================================================

/// Zero-pads the image on every side, then crops a random `size x size` window.
///
/// This is the usual CIFAR-10 augmentation (`size = 32`, `padding = 4`).
/// The window offset comes from the worker RNG, like `RandomHorizontalFlip`.
#[derive(Debug, Clone)]
pub struct RandomCrop {
    size: u32,
    padding: u32,
}

impl RandomCrop {
    pub fn new(size: u32, padding: u32) -> Result<Self> {
        ensure!(size > 0, "Crop size must be positive (got {})", size);
        Ok(Self { size, padding })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomCrop {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        let padded = |side: u32| {
            self.padding
                .checked_mul(2)
                .and_then(|pad| side.checked_add(pad))
        };
        let (Some(padded_w), Some(padded_h)) = (padded(width), padded(height)) else {
            bail!(
                "Padding {} overflows the size of a {}x{} image",
                self.padding,
                width,
                height
            );
        };
        ensure!(
            self.size <= padded_w && self.size <= padded_h,
            "Crop size {} exceeds padded image {}x{}",
            self.size,
            padded_w,
            padded_h
        );

        let mut canvas = RgbImage::new(padded_w, padded_h);
        imageops::replace(
            &mut canvas,
            &img.to_rgb8(),
            self.padding as i64,
            self.padding as i64,
        );

        let x = worker_gen_range(0..(padded_w - self.size + 1) as usize) as u32;
        let y = worker_gen_range(0..(padded_h - self.size + 1) as usize) as u32;
        let cropped = imageops::crop_imm(&canvas, x, y, self.size, self.size).to_image();
        Ok(DynamicImage::ImageRgb8(cropped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloader::init_worker_rng;
    use image::Rgb;

    fn red_blue_strip() -> DynamicImage {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 0, 255]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_random_horizontal_flip() -> Result<()> {
        init_worker_rng(0, 0, 42);

        let flip = RandomHorizontalFlip::new(1.0)?;
        let flipped = flip.apply(red_blue_strip())?;
        assert_eq!(flipped.as_bytes(), &[0, 0, 255, 255, 0, 0]);

        let keep = RandomHorizontalFlip::new(0.0)?;
        let kept = keep.apply(red_blue_strip())?;
        assert_eq!(kept.as_bytes(), red_blue_strip().as_bytes());
        Ok(())
    }

    #[test]
    fn test_random_horizontal_flip_rejects_bad_probability() {
        assert!(RandomHorizontalFlip::new(-0.1).is_err());
        assert!(RandomHorizontalFlip::new(1.5).is_err());
    }

    #[test]
    fn test_random_crop_keeps_size() -> Result<()> {
        init_worker_rng(0, 0, 7);
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([200, 100, 50])));
        let crop = RandomCrop::new(32, 4)?;

        for _ in 0..10 {
            let out = crop.apply(img.clone())?;
            assert_eq!(out.dimensions(), (32, 32));
        }
        Ok(())
    }

    #[test]
    fn test_random_crop_is_reproducible_with_seed() -> Result<()> {
        let mut img = RgbImage::new(8, 8);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgb([(x * 30) as u8, (y * 30) as u8, 0]);
        }
        let img = DynamicImage::ImageRgb8(img);
        let crop = RandomCrop::new(8, 2)?;

        init_worker_rng(3, 1, 99);
        let first = crop.apply(img.clone())?;
        init_worker_rng(3, 1, 99);
        let second = crop.apply(img)?;
        assert_eq!(first.as_bytes(), second.as_bytes());
        Ok(())
    }

    #[test]
    fn test_random_crop_rejects_oversized_window() -> Result<()> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        assert!(RandomCrop::new(10, 1)?.apply(img).is_err());
        assert!(RandomCrop::new(0, 1).is_err());
        Ok(())
    }

    #[test]
    fn test_random_crop_rejects_overflowing_padding() -> Result<()> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let err = RandomCrop::new(4, u32::MAX / 2)?.apply(img.clone()).unwrap_err();
        assert!(err.to_string().contains("overflows"));
        assert!(RandomCrop::new(4, u32::MAX)?.apply(img).is_err());
        Ok(())
    }
}
