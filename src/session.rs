//! Capture slots, retakes and completion for one photobooth session.

use crate::background::{Backdrop, BackgroundLoadError};
use crate::composite::{CompositeError, FrameCompositor};
use crate::segmentation::Mask;
use image::RgbaImage;
use thiserror::Error;

/// Number of slots in a session unless configured otherwise
pub const TOTAL_SLOTS: usize = 4;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Maximum of {max_photos} photos reached")]
    Capacity { max_photos: usize },
    #[error("slot {index} cannot be retaken, only slots below {max_photos} are capturable")]
    Index { index: usize, max_photos: usize },
    #[error("max photos must be between 1 and {total_slots}, got {max_photos}")]
    InvalidMaxPhotos {
        max_photos: usize,
        total_slots: usize,
    },
    #[error("frame size changed from {expected:?} to {actual:?} mid-session")]
    FrameSizeChanged {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("{found} stored slots do not fit a session of {total_slots}")]
    SlotCount { found: usize, total_slots: usize },
    #[error("failed to composite capture: {0}")]
    Composite(#[from] CompositeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Slot {
    #[default]
    Empty,
    Image(RgbaImage),
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        match self {
            Slot::Empty => None,
            Slot::Image(image) => Some(image),
        }
    }
}

/// The filled slots of a session, in slot order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedCaptureSet {
    captures: Vec<RgbaImage>,
}

impl FinishedCaptureSet {
    pub fn new(captures: Vec<RgbaImage>) -> Self {
        Self { captures }
    }

    pub fn captures(&self) -> &[RgbaImage] {
        &self.captures
    }

    pub fn into_captures(self) -> Vec<RgbaImage> {
        self.captures
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

/// What a slot shows in the shot tray
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub index: usize,
    pub image: RgbaImage,
    /// Holds a capture rather than the background placeholder
    pub filled: bool,
    /// Beyond the configured photo count
    pub disabled: bool,
    /// The current retake target
    pub selected: bool,
}

impl Thumbnail {
    /// The image as the tray shows it: disabled slots are grayed out and
    /// faded
    pub fn display_image(&self) -> RgbaImage {
        if !self.disabled {
            return self.image.clone();
        }
        let mut faded = RgbaImage::new(self.image.width(), self.image.height());
        for (out, px) in faded.pixels_mut().zip(self.image.pixels()) {
            let luma = (0.2126 * px[0] as f32 + 0.7152 * px[1] as f32 + 0.0722 * px[2] as f32)
                .round() as u8;
            *out = image::Rgba([luma, luma, luma, (px[3] as f32 * 0.4).round() as u8]);
        }
        faded
    }
}

/// One capture session.
///
/// Slots never shift: a capture lands in the retake target if one is
/// selected, otherwise in the lowest empty capturable slot.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    slots: Vec<Slot>,
    max_photos: usize,
    retake_target: Option<usize>,
    frame_size: Option<(u32, u32)>,
    compositor: FrameCompositor,
}

impl CaptureSession {
    pub fn new(total_slots: usize, max_photos: usize) -> Result<Self, SessionError> {
        if max_photos == 0 || max_photos > total_slots {
            return Err(SessionError::InvalidMaxPhotos {
                max_photos,
                total_slots,
            });
        }
        Ok(Self {
            slots: vec![Slot::Empty; total_slots],
            max_photos,
            retake_target: None,
            frame_size: None,
            compositor: FrameCompositor::new(),
        })
    }

    /// Rebuild a session from stored slots, e.g. to resume after a restart.
    ///
    /// `slots` must hold exactly `total_slots` entries. Images stored in
    /// slots at or beyond `max_photos` are dropped so those slots stay
    /// empty. The kept images must all share one frame size.
    pub fn restore(
        total_slots: usize,
        max_photos: usize,
        slots: Vec<Slot>,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(total_slots, max_photos)?;
        if slots.len() != total_slots {
            return Err(SessionError::SlotCount {
                found: slots.len(),
                total_slots,
            });
        }
        for (index, slot) in slots.into_iter().enumerate() {
            let Slot::Image(image) = slot else {
                continue;
            };
            if index >= max_photos {
                tracing::debug!("Dropping stored photo in disabled slot {}", index + 1);
                continue;
            }
            let actual = image.dimensions();
            match session.frame_size {
                Some(expected) if expected != actual => {
                    return Err(SessionError::FrameSizeChanged { expected, actual });
                }
                _ => session.frame_size = Some(actual),
            }
            session.slots[index] = Slot::Image(image);
        }
        Ok(session)
    }

    pub fn max_photos(&self) -> usize {
        self.max_photos
    }

    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn retake_target(&self) -> Option<usize> {
        self.retake_target
    }

    /// Frame size bound by the first capture
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.frame_size
    }

    pub fn is_capturable(&self, index: usize) -> bool {
        index < self.max_photos
    }

    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_empty()).count()
    }

    /// All capturable slots hold an image
    pub fn is_full(&self) -> bool {
        self.slots[..self.max_photos].iter().all(|slot| !slot.is_empty())
    }

    /// Slot the next capture would write to
    pub fn next_target(&self) -> Option<usize> {
        self.retake_target.or_else(|| {
            self.slots[..self.max_photos]
                .iter()
                .position(Slot::is_empty)
        })
    }

    /// Aim the next capture at `index`, filled or not
    pub fn select_retake(&mut self, index: usize) -> Result<(), SessionError> {
        if !self.is_capturable(index) {
            return Err(SessionError::Index {
                index,
                max_photos: self.max_photos,
            });
        }
        self.retake_target = Some(index);
        Ok(())
    }

    pub fn clear_retake(&mut self) {
        self.retake_target = None;
    }

    /// Composite a frame into the next target slot and return its index.
    ///
    /// On any error neither the slots nor the retake target change.
    pub fn capture(
        &mut self,
        frame: &RgbaImage,
        mask: &Mask,
        backdrop: &Backdrop,
    ) -> Result<usize, SessionError> {
        let target = self.next_target().ok_or(SessionError::Capacity {
            max_photos: self.max_photos,
        })?;

        let size = frame.dimensions();
        if let Some(expected) = self.frame_size {
            if expected != size {
                return Err(SessionError::FrameSizeChanged {
                    expected,
                    actual: size,
                });
            }
        }

        let composite = self.compositor.composite(frame, mask, backdrop)?;

        self.slots[target] = Slot::Image(composite);
        self.frame_size = Some(size);
        self.retake_target = None;
        Ok(target)
    }

    /// Filled slots in slot order; the session is left as is
    pub fn finish(&self) -> FinishedCaptureSet {
        FinishedCaptureSet::new(
            self.slots
                .iter()
                .filter_map(|slot| slot.image().cloned())
                .collect(),
        )
    }

    /// One thumbnail per slot, empty slots showing the background
    pub fn thumbnails(&self, backdrop: &Backdrop) -> Result<Vec<Thumbnail>, BackgroundLoadError> {
        let mut placeholder = None;
        let mut thumbnails = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.iter().enumerate() {
            let (image, filled) = match slot {
                Slot::Image(image) => (image.clone(), true),
                Slot::Empty => {
                    if placeholder.is_none() {
                        placeholder = Some(backdrop.preview()?);
                    }
                    (placeholder.clone().unwrap_or_default(), false)
                }
            };
            thumbnails.push(Thumbnail {
                index,
                image,
                filled,
                disabled: !self.is_capturable(index),
                selected: self.retake_target == Some(index),
            });
        }
        Ok(thumbnails)
    }
}
