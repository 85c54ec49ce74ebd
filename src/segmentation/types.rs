use anyhow::Result;
use image::{GrayImage, RgbImage};
use thiserror::Error;

/// Alpha matte: grayscale values where 0.0 = background, 1.0 = foreground
/// Dimensions match the input frame dimensions
pub type Matte = Vec<f32>;

/// Trait for segmentation models
/// Allows swapping between different backends (RVM, still mattes, ...)
pub trait SegmentationModel {
    /// Process a frame and return an alpha matte
    ///
    /// # Arguments
    /// * `frame` - Input RGB frame
    ///
    /// # Returns
    /// * Alpha matte with values 0.0-1.0, flattened in row-major order,
    ///   one entry per frame pixel
    fn segment(&mut self, frame: &RgbImage) -> Result<Matte>;

    /// Segment a frame and threshold the matte into a binary mask
    fn segment_mask(&mut self, frame: &RgbImage, threshold: f32) -> Result<Mask> {
        let matte = self.segment(frame)?;
        let (width, height) = frame.dimensions();
        Ok(Mask::from_matte(&matte, width, height, threshold)?)
    }

    /// Reset internal state (for models with temporal/recurrent components)
    ///
    /// Call this when a new capture session starts.
    fn reset_state(&mut self) {
        // Default implementation: no-op for stateless models
    }

    /// Get the model's preferred input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);

    /// Get the output dimensions (usually matches input)
    ///
    /// Returns (width, height)
    fn output_size(&self) -> (u32, u32) {
        self.input_size()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaskError {
    #[error("mask has {len} entries but a {width}x{height} frame needs one per pixel ({expected})")]
    LengthMismatch {
        width: u32,
        height: u32,
        len: usize,
        expected: usize,
    },
}

/// Per-pixel binary foreground/background classification.
///
/// Holds exactly one entry per pixel in row-major order, never one per
/// channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    foreground: Vec<bool>,
}

impl Mask {
    pub fn new(width: u32, height: u32, foreground: Vec<bool>) -> Result<Self, MaskError> {
        let expected = width as usize * height as usize;
        if foreground.len() != expected {
            return Err(MaskError::LengthMismatch {
                width,
                height,
                len: foreground.len(),
                expected,
            });
        }
        Ok(Self {
            width,
            height,
            foreground,
        })
    }

    /// Mask with every pixel set to the same class
    pub fn filled(width: u32, height: u32, foreground: bool) -> Self {
        Self {
            width,
            height,
            foreground: vec![foreground; width as usize * height as usize],
        }
    }

    /// Threshold a matte: values `>= threshold` are foreground
    pub fn from_matte(
        matte: &[f32],
        width: u32,
        height: u32,
        threshold: f32,
    ) -> Result<Self, MaskError> {
        Self::new(
            width,
            height,
            matte.iter().map(|&alpha| alpha >= threshold).collect(),
        )
    }

    /// Threshold a grayscale image: luma `>= threshold` is foreground
    pub fn from_luma(image: &GrayImage, threshold: u8) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            foreground: image.pixels().map(|p| p[0] >= threshold).collect(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.foreground[(y * self.width + x) as usize]
    }

    pub fn foreground_count(&self) -> usize {
        self.foreground.iter().filter(|&&fg| fg).count()
    }

    /// Row-major per-pixel classification
    pub fn as_slice(&self) -> &[bool] {
        &self.foreground
    }

    /// White-on-black rendering, handy for inspecting a mask on disk
    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([if self.is_foreground(x, y) { 255 } else { 0 }])
        })
    }
}
