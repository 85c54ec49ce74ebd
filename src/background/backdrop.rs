use super::BackgroundSource;
use image::{imageops, RgbaImage};
use std::sync::OnceLock;
use thiserror::Error;

/// Size of the flat swatch shown for a color background in empty slots
pub const PREVIEW_SIZE: (u32, u32) = (150, 100);

#[derive(Debug, Error)]
#[error("failed to load background {what}: {source}")]
pub struct BackgroundLoadError {
    what: String,
    #[source]
    source: image::ImageError,
}

/// A background source ready to be drawn.
///
/// Image backgrounds are decoded on first draw and the pixels kept for
/// the rest of the session. A failed decode is not cached.
#[derive(Debug)]
pub struct Backdrop {
    source: BackgroundSource,
    decoded: OnceLock<RgbaImage>,
}

impl Backdrop {
    pub fn new(source: BackgroundSource) -> Self {
        Self {
            source,
            decoded: OnceLock::new(),
        }
    }

    pub fn source(&self) -> &BackgroundSource {
        &self.source
    }

    /// Whether an image background has been decoded already
    pub fn is_loaded(&self) -> bool {
        !self.source.is_image() || self.decoded.get().is_some()
    }

    /// Render the background at exactly `width` x `height`.
    ///
    /// Colors are flat-filled; images are stretched to the full frame
    /// without preserving aspect.
    pub fn render(&self, width: u32, height: u32) -> Result<RgbaImage, BackgroundLoadError> {
        let _span = tracing::debug_span!("render_background", width, height).entered();

        match &self.source {
            BackgroundSource::Color(color) => Ok(RgbaImage::from_pixel(width, height, color.rgba())),
            BackgroundSource::StaticImage(_) | BackgroundSource::UploadedImage(_) => {
                let image = self.image()?;
                if image.dimensions() == (width, height) {
                    Ok(image.clone())
                } else {
                    Ok(imageops::resize(
                        image,
                        width,
                        height,
                        imageops::FilterType::Triangle,
                    ))
                }
            }
        }
    }

    /// Placeholder for an empty slot: the image itself, or a color swatch
    pub fn preview(&self) -> Result<RgbaImage, BackgroundLoadError> {
        Ok(self.image()?.clone())
    }

    fn image(&self) -> Result<&RgbaImage, BackgroundLoadError> {
        if let Some(image) = self.decoded.get() {
            return Ok(image);
        }

        let image = match &self.source {
            BackgroundSource::StaticImage(path) => image::open(path)
                .map_err(|source| BackgroundLoadError {
                    what: path.display().to_string(),
                    source,
                })?
                .to_rgba8(),
            BackgroundSource::UploadedImage(upload) => image::load_from_memory(upload.bytes())
                .map_err(|source| BackgroundLoadError {
                    what: format!("upload ({})", upload.mime()),
                    source,
                })?
                .to_rgba8(),
            BackgroundSource::Color(color) => {
                RgbaImage::from_pixel(PREVIEW_SIZE.0, PREVIEW_SIZE.1, color.rgba())
            }
        };

        Ok(self.decoded.get_or_init(|| image))
    }
}

impl From<BackgroundSource> for Backdrop {
    fn from(source: BackgroundSource) -> Self {
        Self::new(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::path::PathBuf;

    #[test]
    fn test_color_fills_requested_size() {
        let backdrop = Backdrop::new(BackgroundSource::parse("#0000ff").unwrap());
        let out = backdrop.render(7, 3).unwrap();
        assert_eq!(out.dimensions(), (7, 3));
        assert!(out.pixels().all(|p| *p == Rgba([0, 0, 255, 255])));
        assert_eq!(backdrop.preview().unwrap().dimensions(), PREVIEW_SIZE);
    }

    #[test]
    fn test_image_is_stretched_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        RgbaImage::from_pixel(2, 8, Rgba([9, 8, 7, 255])).save(&path).unwrap();

        let backdrop = Backdrop::new(BackgroundSource::StaticImage(path.clone()));
        assert!(!backdrop.is_loaded());
        let out = backdrop.render(10, 4).unwrap();
        assert_eq!(out.dimensions(), (10, 4));
        assert!(out.pixels().all(|p| *p == Rgba([9, 8, 7, 255])));
        assert!(backdrop.is_loaded());

        // Cached pixels survive the file going away
        std::fs::remove_file(&path).unwrap();
        assert!(backdrop.render(3, 3).is_ok());
    }

    #[test]
    fn test_missing_image_is_a_load_error() {
        let backdrop = Backdrop::new(BackgroundSource::StaticImage(PathBuf::from(
            "/nonexistent/photobooth/bg.jpg",
        )));
        let err = backdrop.render(4, 4).unwrap_err();
        assert!(err.to_string().contains("bg.jpg"));
        assert!(!backdrop.is_loaded());
    }
}
