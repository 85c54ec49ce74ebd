//! Mask-driven merge of a live frame over a rendered background.

use crate::background::{Backdrop, BackgroundLoadError};
use crate::segmentation::Mask;
use image::RgbaImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error(transparent)]
    BackgroundLoad(#[from] BackgroundLoadError),
    #[error("mask is {mask_width}x{mask_height} but the frame is {frame_width}x{frame_height}")]
    MaskMismatch {
        frame_width: u32,
        frame_height: u32,
        mask_width: u32,
        mask_height: u32,
    },
}

/// Replaces everything outside the subject with the background.
///
/// The boundary is exactly the mask edge; there is no feathering.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCompositor;

impl FrameCompositor {
    pub fn new() -> Self {
        Self
    }

    /// Composite `frame` over `backdrop` using `mask`.
    ///
    /// The output always has the frame's dimensions. Foreground pixels take
    /// the frame's RGB with full opacity; background pixels are the
    /// rendered backdrop unchanged.
    pub fn composite(
        &self,
        frame: &RgbaImage,
        mask: &Mask,
        backdrop: &Backdrop,
    ) -> Result<RgbaImage, CompositeError> {
        let (width, height) = frame.dimensions();
        let (mask_width, mask_height) = mask.dimensions();
        if (mask_width, mask_height) != (width, height) {
            return Err(CompositeError::MaskMismatch {
                frame_width: width,
                frame_height: height,
                mask_width,
                mask_height,
            });
        }

        let _span = tracing::debug_span!("composite", width, height).entered();

        // Background first, subject last
        let mut output = backdrop.render(width, height)?;

        for ((out, live), &foreground) in output
            .pixels_mut()
            .zip(frame.pixels())
            .zip(mask.as_slice())
        {
            if foreground {
                out[0] = live[0];
                out[1] = live[1];
                out[2] = live[2];
                out[3] = 255;
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::BackgroundSource;
    use image::Rgba;
    use std::path::PathBuf;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 20) as u8, (y * 30) as u8, 77, 40])
        })
    }

    fn red() -> Backdrop {
        Backdrop::new(BackgroundSource::parse("#ff0000").unwrap())
    }

    #[test]
    fn test_all_foreground_is_opaque_frame() {
        let frame = gradient(5, 4);
        let out = FrameCompositor::new()
            .composite(&frame, &Mask::filled(5, 4, true), &red())
            .unwrap();
        for (x, y, p) in out.enumerate_pixels() {
            let live = frame.get_pixel(x, y);
            assert_eq!(*p, Rgba([live[0], live[1], live[2], 255]));
        }
    }

    #[test]
    fn test_all_background_is_rendered_backdrop() {
        let backdrop = red();
        let out = FrameCompositor::new()
            .composite(&gradient(5, 4), &Mask::filled(5, 4, false), &backdrop)
            .unwrap();
        assert_eq!(out, backdrop.render(5, 4).unwrap());
    }

    #[test]
    fn test_mixed_mask_follows_edge_exactly() {
        let frame = gradient(2, 2);
        let mask = Mask::new(2, 2, vec![true, false, false, true]).unwrap();
        let out = FrameCompositor::new().composite(&frame, &mask, &red()).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 77, 255]));
        assert_eq!(*out.get_pixel(1, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*out.get_pixel(0, 1), Rgba([255, 0, 0, 255]));
        assert_eq!(*out.get_pixel(1, 1), Rgba([20, 30, 77, 255]));
    }

    #[test]
    fn test_output_matches_frame_size() {
        let out = FrameCompositor::new()
            .composite(&gradient(9, 3), &Mask::filled(9, 3, false), &red())
            .unwrap();
        assert_eq!(out.dimensions(), (9, 3));
    }

    #[test]
    fn test_mask_size_mismatch() {
        let err = FrameCompositor::new()
            .composite(&gradient(4, 4), &Mask::filled(2, 8, true), &red())
            .unwrap_err();
        assert!(matches!(err, CompositeError::MaskMismatch { mask_width: 2, .. }));
    }

    #[test]
    fn test_unloadable_background() {
        let backdrop = Backdrop::new(BackgroundSource::StaticImage(PathBuf::from(
            "/nonexistent/bg.png",
        )));
        let err = FrameCompositor::new()
            .composite(&gradient(2, 2), &Mask::filled(2, 2, true), &backdrop)
            .unwrap_err();
        assert!(matches!(err, CompositeError::BackgroundLoad(_)));
    }
}
