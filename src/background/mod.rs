//! Background selection and rendering.
//!
//! A background is decided once, when it is selected, as one of three
//! forms: a flat color, an image on disk, or uploaded image bytes. The
//! [`Backdrop`] wrapper is what the compositor draws from.

mod backdrop;
mod color;

pub use backdrop::{Backdrop, BackgroundLoadError, PREVIEW_SIZE};
pub use color::CssColor;

use crate::data_uri::{self, DataUriError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Background used when nothing has been selected
pub const DEFAULT_BACKGROUND: &str = "pictures/photoboothbg.jpg";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum BackgroundError {
    #[error("'{0}' is not a recognised color")]
    UnknownColor(String),
    #[error("uploaded background is not a valid data URI: {0}")]
    InvalidDataUri(#[from] DataUriError),
    #[error("uploaded file is not a readable image: {0}")]
    UnreadableUpload(#[source] image::ImageError),
}

/// Uploaded image bytes, kept encoded until first drawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    mime: String,
    bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_data_uri(&self) -> String {
        data_uri::encode(&self.bytes, &self.mime)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundSource {
    Color(CssColor),
    StaticImage(PathBuf),
    UploadedImage(UploadedImage),
}

impl BackgroundSource {
    /// Decide the form of a stored background setting: a data URI, an
    /// image path, or a CSS color
    pub fn parse(setting: &str) -> Result<Self, BackgroundError> {
        let setting = setting.trim();
        if setting.starts_with("data:image") {
            let (mime, bytes) = data_uri::decode(setting)?;
            return Ok(Self::UploadedImage(UploadedImage { mime, bytes }));
        }
        if has_image_extension(Path::new(setting)) {
            return Ok(Self::StaticImage(PathBuf::from(setting)));
        }
        Ok(Self::Color(CssColor::parse(setting)?))
    }

    /// Validate uploaded file bytes as an image
    pub fn from_upload(bytes: &[u8]) -> Result<Self, BackgroundError> {
        let format = image::guess_format(bytes).map_err(BackgroundError::UnreadableUpload)?;
        image::load_from_memory_with_format(bytes, format)
            .map_err(BackgroundError::UnreadableUpload)?;
        Ok(Self::UploadedImage(UploadedImage {
            mime: format.to_mime_type().to_string(),
            bytes: bytes.to_vec(),
        }))
    }

    /// Inverse of [`BackgroundSource::parse`]
    pub fn to_setting(&self) -> String {
        match self {
            Self::Color(color) => color.as_str().to_string(),
            Self::StaticImage(path) => path.to_string_lossy().into_owned(),
            Self::UploadedImage(upload) => upload.to_data_uri(),
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, Self::Color(_))
    }

    /// Short human readable label for logs
    pub fn describe(&self) -> String {
        match self {
            Self::Color(color) => format!("color {}", color.as_str()),
            Self::StaticImage(path) => format!("image {}", path.display()),
            Self::UploadedImage(upload) => {
                format!("uploaded {} ({} bytes)", upload.mime, upload.bytes.len())
            }
        }
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Holds the background chosen before a session starts
#[derive(Debug, Clone)]
pub struct BackgroundSelector {
    default_image: PathBuf,
    selected: Option<BackgroundSource>,
}

impl Default for BackgroundSelector {
    fn default() -> Self {
        Self::new(DEFAULT_BACKGROUND)
    }
}

impl BackgroundSelector {
    pub fn new(default_image: impl Into<PathBuf>) -> Self {
        Self {
            default_image: default_image.into(),
            selected: None,
        }
    }

    /// The selected background, or the built-in default image
    pub fn resolve(&self) -> BackgroundSource {
        self.selected
            .clone()
            .unwrap_or_else(|| BackgroundSource::StaticImage(self.default_image.clone()))
    }

    pub fn select(&mut self, source: BackgroundSource) {
        self.selected = Some(source);
    }

    /// Select from a stored setting string. On error the previous
    /// selection is kept.
    pub fn select_setting(&mut self, setting: &str) -> Result<&BackgroundSource, BackgroundError> {
        let source = BackgroundSource::parse(setting)?;
        let selected: &BackgroundSource = self.selected.insert(source);
        Ok(selected)
    }

    /// Select uploaded file bytes. On error the previous selection is kept.
    pub fn set_from_upload(&mut self, bytes: &[u8]) -> Result<&BackgroundSource, BackgroundError> {
        let source = BackgroundSource::from_upload(bytes)?;
        let selected: &BackgroundSource = self.selected.insert(source);
        Ok(selected)
    }

    pub fn has_selection(&self) -> bool {
        self.selected.is_some()
    }
}
