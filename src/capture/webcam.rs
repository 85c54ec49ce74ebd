use super::CaptureSource;
use anyhow::{bail, Context, Result};
use image::{imageops, RgbImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

/// Frames thrown away after the stream opens while exposure settles
const WARMUP_FRAMES: usize = 5;

/// A live camera used for single stills.
///
/// The resolution negotiated when the stream opens is the resolution of
/// every photo of the session; frames the driver hands back at any other
/// size are scaled to it.
pub struct WebcamCapture {
    camera: Camera,
    size: (u32, u32),
}

impl WebcamCapture {
    pub fn open(device_index: u32) -> Result<Self> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
        let mut camera = Camera::new(CameraIndex::Index(device_index), requested)
            .with_context(|| format!("Cannot access camera {}", device_index))?;
        camera
            .open_stream()
            .context("Failed to open camera stream")?;

        let resolution = camera.resolution();
        let size = (resolution.width(), resolution.height());
        if size.0 == 0 || size.1 == 0 {
            bail!("Camera {} reported an empty resolution", device_index);
        }

        let mut webcam = Self { camera, size };
        for _ in 0..WARMUP_FRAMES {
            webcam.grab().context("Camera produced no frames")?;
        }
        tracing::info!("Camera {} streaming at {}x{}", device_index, size.0, size.1);
        Ok(webcam)
    }

    fn grab(&mut self) -> Result<RgbImage> {
        self.camera
            .frame()
            .context("Failed to capture frame")?
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")
    }
}

impl CaptureSource for WebcamCapture {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        let frame = self.grab()?;
        if frame.dimensions() == self.size {
            return Ok(frame);
        }
        tracing::debug!(
            "Scaling {}x{} frame to {}x{}",
            frame.width(),
            frame.height(),
            self.size.0,
            self.size.1
        );
        Ok(imageops::resize(
            &frame,
            self.size.0,
            self.size.1,
            imageops::FilterType::Triangle,
        ))
    }

    fn resolution(&self) -> (u32, u32) {
        self.size
    }
}

impl Drop for WebcamCapture {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!("Failed to stop camera stream: {}", e);
        }
    }
}
