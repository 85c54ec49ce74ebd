use anyhow::Result;
use image::{imageops, RgbImage};
#[cfg(feature = "rvm")]
use ndarray::Array4;

/// Preprocessor for converting RGB images to model input tensors and
/// model mattes back to frame resolution
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Preprocess an RGB image into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Convert to float and normalize to [0, 1]
    /// 3. Transpose from HWC to NCHW format
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    #[cfg(feature = "rvm")]
    pub fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized = if image.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            )
        } else {
            image.clone()
        };

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
            }
        }

        Ok(tensor)
    }

    /// Model input dimensions as (width, height)
    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Postprocess a matte back to frame dimensions
    ///
    /// # Arguments
    /// * `matte` - Flattened matte at model resolution
    /// * `matte_width` - Width of the matte
    /// * `matte_height` - Height of the matte
    /// * `target_width` - Desired output width
    /// * `target_height` - Desired output height
    ///
    /// Returns: Resized matte flattened in row-major order
    pub fn postprocess_matte(
        matte: &[f32],
        matte_width: u32,
        matte_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<Vec<f32>> {
        let _span = tracing::debug_span!("postprocess").entered();

        let expected = matte_width as usize * matte_height as usize;
        if matte.len() != expected {
            anyhow::bail!(
                "matte has {} values, expected {} for {}x{}",
                matte.len(),
                expected,
                matte_width,
                matte_height
            );
        }

        if matte_width == target_width && matte_height == target_height {
            return Ok(matte.to_vec());
        }

        // Round-trip through a grayscale image so imageops can do the resize
        let gray_image = image::GrayImage::from_fn(matte_width, matte_height, |x, y| {
            let idx = (y * matte_width + x) as usize;
            let value = (matte[idx] * 255.0).clamp(0.0, 255.0) as u8;
            image::Luma([value])
        });

        let resized = imageops::resize(
            &gray_image,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        );

        Ok(resized.pixels().map(|p| p[0] as f32 / 255.0).collect())
    }

    /// Convert matte to grayscale RGB image for visualization
    pub fn matte_to_rgb(matte: &[f32], width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let idx = (y * width + x) as usize;
            let value = (matte[idx] * 255.0).clamp(0.0, 255.0) as u8;
            image::Rgb([value, value, value])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postprocess_same_size_is_identity() {
        let matte = vec![0.0, 0.25, 0.75, 1.0];
        let out = Preprocessor::postprocess_matte(&matte, 2, 2, 2, 2).unwrap();
        assert_eq!(out, matte);
    }

    #[test]
    fn test_postprocess_resizes_to_frame() {
        let matte = vec![1.0; 4 * 4];
        let out = Preprocessor::postprocess_matte(&matte, 4, 4, 8, 6).unwrap();
        assert_eq!(out.len(), 48);
        assert!(out.iter().all(|&v| v > 0.99));
    }

    #[test]
    fn test_postprocess_rejects_short_matte() {
        assert!(Preprocessor::postprocess_matte(&[0.5; 3], 2, 2, 4, 4).is_err());
    }

    #[test]
    fn test_matte_to_rgb() {
        let img = Preprocessor::matte_to_rgb(&[0.0, 1.0], 2, 1);
        assert_eq!(img.get_pixel(0, 0), &image::Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(1, 0), &image::Rgb([255, 255, 255]));
    }
}
