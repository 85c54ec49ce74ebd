use super::CaptureSource;
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::PathBuf;

/// Replays image files as if they came from a camera, cycling when the
/// list runs out
pub struct StillFrames {
    paths: Vec<PathBuf>,
    next: usize,
    width: u32,
    height: u32,
}

impl StillFrames {
    /// The first frame decides the reported resolution
    pub fn new(paths: Vec<PathBuf>) -> Result<Self> {
        let first = paths
            .first()
            .context("Still frame source needs at least one image")?;
        let (width, height) = image::image_dimensions(first)
            .with_context(|| format!("Failed to read {}", first.display()))?;

        tracing::info!(
            "Replaying {} still frame(s) at {}x{}",
            paths.len(),
            width,
            height
        );

        Ok(Self {
            paths,
            next: 0,
            width,
            height,
        })
    }
}

impl CaptureSource for StillFrames {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        let path = &self.paths[self.next];
        self.next = (self.next + 1) % self.paths.len();

        tracing::debug!("Reading still frame {}", path.display());
        let frame = image::open(path)
            .with_context(|| format!("Failed to load frame {}", path.display()))?
            .to_rgb8();
        Ok(frame)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
