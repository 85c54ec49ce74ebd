//! Arranging finished captures into a framed strip.

use crate::config::StripConfig;
use image::{imageops, DynamicImage, RgbaImage};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StripError {
    #[error("no captures to lay out")]
    Empty,
    #[error("layout has {expected} photos but {actual} captures were given")]
    CountMismatch { expected: usize, actual: usize },
    #[error("failed to load frame image {path}: {source}")]
    FrameLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseChoiceError {
    kind: &'static str,
    value: String,
}

/// Aspect ratio chosen for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhotoSize {
    Portrait,
    Square,
    #[default]
    Landscape,
}

impl PhotoSize {
    pub const ALL: [PhotoSize; 3] = [PhotoSize::Portrait, PhotoSize::Square, PhotoSize::Landscape];

    /// Camera frame proportions as (width, height)
    pub fn aspect(self) -> (u32, u32) {
        match self {
            PhotoSize::Portrait => (380, 550),
            PhotoSize::Square => (550, 550),
            PhotoSize::Landscape => (800, 550),
        }
    }

    /// Photo size in the strip with `baseline` on the short axis
    pub fn display_size(self, baseline: u32) -> (u32, u32) {
        let (w, h) = self.aspect();
        let long = |num: u32, den: u32| (baseline as f64 * num as f64 / den as f64).round() as u32;
        if w >= h {
            (long(w, h), baseline)
        } else {
            (baseline, long(h, w))
        }
    }

    pub fn default_direction(self) -> StackDirection {
        match self {
            PhotoSize::Portrait | PhotoSize::Square => StackDirection::Vertical,
            PhotoSize::Landscape => StackDirection::Horizontal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhotoSize::Portrait => "Portrait",
            PhotoSize::Square => "Square",
            PhotoSize::Landscape => "Landscape",
        }
    }
}

impl fmt::Display for PhotoSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhotoSize {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhotoSize::ALL
            .into_iter()
            .find(|size| size.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseChoiceError {
                kind: "photo size",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackDirection {
    Vertical,
    Horizontal,
}

impl StackDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            StackDirection::Vertical => "vertical",
            StackDirection::Horizontal => "horizontal",
        }
    }
}

impl fmt::Display for StackDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackDirection {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertical" => Ok(StackDirection::Vertical),
            "horizontal" => Ok(StackDirection::Horizontal),
            _ => Err(ParseChoiceError {
                kind: "orientation",
                value: s.to_string(),
            }),
        }
    }
}

/// Frame artwork shared by every photo in a strip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSkin {
    key: String,
}

impl FrameSkin {
    /// The stock frame for a photo size
    pub fn for_size(size: PhotoSize) -> Self {
        Self::from_key(size.as_str())
    }

    /// A key containing `.` is a file name, anything else a size name
    pub fn from_key(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn file_name(&self) -> String {
        if self.key.contains('.') {
            self.key.clone()
        } else {
            format!("frame-{}.png", self.key)
        }
    }

    pub fn path_in(&self, frames_dir: &Path) -> PathBuf {
        frames_dir.join(self.file_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedPhoto {
    /// Position of the padded box in the strip
    pub x: u32,
    pub y: u32,
    /// Picture size inside the frame border
    pub width: u32,
    pub height: u32,
    /// Picture plus frame border on every side
    pub outer_width: u32,
    pub outer_height: u32,
    pub frame_image: PathBuf,
}

/// Geometry of a strip. Re-arranging it never touches the captures.
#[derive(Debug, Clone)]
pub struct StripLayout {
    photo_size: PhotoSize,
    direction: StackDirection,
    skin: FrameSkin,
    frames_dir: PathBuf,
    gap: u32,
    photos: Vec<PlacedPhoto>,
}

impl StripLayout {
    pub fn photos(&self) -> &[PlacedPhoto] {
        &self.photos
    }

    pub fn photo_size(&self) -> PhotoSize {
        self.photo_size
    }

    pub fn direction(&self) -> StackDirection {
        self.direction
    }

    pub fn skin(&self) -> &FrameSkin {
        &self.skin
    }

    /// Bounding box of all framed photos
    pub fn dimensions(&self) -> (u32, u32) {
        self.photos.iter().fold((0, 0), |(w, h), p| {
            (w.max(p.x + p.outer_width), h.max(p.y + p.outer_height))
        })
    }

    pub fn set_direction(&mut self, direction: StackDirection) {
        self.direction = direction;
        let mut offset = 0;
        for photo in &mut self.photos {
            match direction {
                StackDirection::Vertical => {
                    photo.x = 0;
                    photo.y = offset;
                    offset += photo.outer_height + self.gap;
                }
                StackDirection::Horizontal => {
                    photo.x = offset;
                    photo.y = 0;
                    offset += photo.outer_width + self.gap;
                }
            }
        }
    }

    /// Swap the frame artwork on every photo at once
    pub fn set_skin(&mut self, skin: FrameSkin) {
        let frame_image = skin.path_in(&self.frames_dir);
        for photo in &mut self.photos {
            photo.frame_image = frame_image.clone();
        }
        self.skin = skin;
    }
}

/// Computes strip geometry and renders strips
#[derive(Debug, Clone)]
pub struct StripAssembler {
    baseline: u32,
    margin: u32,
    gap: u32,
    frames_dir: PathBuf,
}

impl Default for StripAssembler {
    fn default() -> Self {
        Self::from_config(&StripConfig::default())
    }
}

impl StripAssembler {
    pub fn new(baseline: u32, margin: u32, gap: u32, frames_dir: impl Into<PathBuf>) -> Self {
        Self {
            baseline,
            margin,
            gap,
            frames_dir: frames_dir.into(),
        }
    }

    pub fn from_config(config: &StripConfig) -> Self {
        Self::new(
            config.baseline,
            config.margin,
            config.gap,
            config.frames_dir.clone(),
        )
    }

    pub fn frames_dir(&self) -> &Path {
        &self.frames_dir
    }

    /// One placed photo per capture, stacked in the size's default
    /// direction
    pub fn layout(&self, captures: &[RgbaImage], size: PhotoSize, skin: &FrameSkin) -> StripLayout {
        let (width, height) = size.display_size(self.baseline);
        let frame_image = skin.path_in(&self.frames_dir);
        let photos = captures
            .iter()
            .map(|_| PlacedPhoto {
                x: 0,
                y: 0,
                width,
                height,
                outer_width: width + self.margin * 2,
                outer_height: height + self.margin * 2,
                frame_image: frame_image.clone(),
            })
            .collect();

        let mut layout = StripLayout {
            photo_size: size,
            direction: size.default_direction(),
            skin: skin.clone(),
            frames_dir: self.frames_dir.clone(),
            gap: self.gap,
            photos,
        };
        layout.set_direction(size.default_direction());
        layout
    }

    /// Draw the strip: each frame stretched over its padded box, each
    /// capture scaled to cover its picture box and center-cropped
    pub fn render(&self, layout: &StripLayout, captures: &[RgbaImage]) -> Result<RgbaImage, StripError> {
        if captures.is_empty() {
            return Err(StripError::Empty);
        }
        if captures.len() != layout.photos.len() {
            return Err(StripError::CountMismatch {
                expected: layout.photos.len(),
                actual: captures.len(),
            });
        }

        let _span = tracing::debug_span!("render_strip", photos = captures.len()).entered();

        let (width, height) = layout.dimensions();
        let mut canvas = RgbaImage::new(width, height);
        let mut frame_art: Option<(PathBuf, RgbaImage)> = None;

        for (photo, capture) in layout.photos.iter().zip(captures) {
            let reload = frame_art
                .as_ref()
                .map_or(true, |(path, _)| *path != photo.frame_image);
            if reload {
                let art = image::open(&photo.frame_image)
                    .map_err(|source| StripError::FrameLoad {
                        path: photo.frame_image.clone(),
                        source,
                    })?
                    .to_rgba8();
                frame_art = Some((photo.frame_image.clone(), art));
            }
            if let Some((_, art)) = &frame_art {
                let frame = imageops::resize(
                    art,
                    photo.outer_width,
                    photo.outer_height,
                    imageops::FilterType::Triangle,
                );
                imageops::replace(&mut canvas, &frame, photo.x as i64, photo.y as i64);
            }

            let picture = DynamicImage::ImageRgba8(capture.clone())
                .resize_to_fill(photo.width, photo.height, imageops::FilterType::Triangle)
                .to_rgba8();
            imageops::replace(
                &mut canvas,
                &picture,
                (photo.x + self.margin) as i64,
                (photo.y + self.margin) as i64,
            );
        }

        Ok(canvas)
    }
}
