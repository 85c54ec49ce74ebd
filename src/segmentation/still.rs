use super::preprocess::Preprocessor;
use super::types::{Matte, SegmentationModel};
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::Path;

/// A fixed matte replayed for every frame
///
/// Stands in for a live model when frames come from disk: the stored matte
/// is resized to whatever frame it is asked to segment.
pub struct StillMatte {
    matte: Matte,
    width: u32,
    height: u32,
}

impl StillMatte {
    pub fn new(matte: Matte, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize;
        if matte.len() != expected {
            anyhow::bail!(
                "still matte has {} values, expected {} for {}x{}",
                matte.len(),
                expected,
                width,
                height
            );
        }
        Ok(Self {
            matte,
            width,
            height,
        })
    }

    /// Load a grayscale matte image (white = subject)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let gray = image::open(path)
            .with_context(|| format!("Failed to load matte from {}", path.display()))?
            .to_luma8();
        let (width, height) = gray.dimensions();
        let matte = gray.pixels().map(|p| p[0] as f32 / 255.0).collect();
        Self::new(matte, width, height)
    }
}

impl SegmentationModel for StillMatte {
    fn segment(&mut self, frame: &RgbImage) -> Result<Matte> {
        let (frame_width, frame_height) = frame.dimensions();
        Preprocessor::postprocess_matte(
            &self.matte,
            self.width,
            self.height,
            frame_width,
            frame_height,
        )
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_still_matte_scales_to_frame() {
        let mut model = StillMatte::new(vec![0.0, 1.0, 0.0, 1.0], 2, 2).unwrap();
        let frame = RgbImage::new(2, 2);
        let mask = model.segment_mask(&frame, 0.5).unwrap();
        assert_eq!(mask.as_slice(), &[false, true, false, true]);

        let big = RgbImage::new(6, 4);
        assert_eq!(model.segment(&big).unwrap().len(), 24);
    }

    #[test]
    fn test_still_matte_rejects_bad_length() {
        assert!(StillMatte::new(vec![1.0; 3], 2, 2).is_err());
    }
}
