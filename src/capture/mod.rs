mod still;
#[cfg(feature = "webcam")]
mod webcam;

pub use still::StillFrames;
#[cfg(feature = "webcam")]
pub use webcam::WebcamCapture;

use anyhow::Result;
use image::RgbImage;

/// Trait for camera capture sources
pub trait CaptureSource {
    /// Capture a single frame
    fn capture_frame(&mut self) -> Result<RgbImage>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);
}

/// Open the webcam at `device_index`
#[cfg(feature = "webcam")]
pub fn open_webcam(device_index: u32) -> Result<Box<dyn CaptureSource>> {
    Ok(Box::new(WebcamCapture::open(device_index)?))
}

#[cfg(not(feature = "webcam"))]
pub fn open_webcam(device_index: u32) -> Result<Box<dyn CaptureSource>> {
    anyhow::bail!(
        "cannot open camera {}: photobooth was built without the `webcam` feature",
        device_index
    )
}
