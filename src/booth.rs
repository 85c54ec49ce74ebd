//! The booth: camera, segmentation model and capture session wired
//! together the way the shooting screen drives them.

use crate::background::{Backdrop, BackgroundLoadError};
use crate::capture::CaptureSource;
use crate::config::SessionConfig;
use crate::segmentation::SegmentationModel;
use crate::session::{CaptureSession, FinishedCaptureSet, SessionError, Slot, Thumbnail};
use crate::store::{self, KeyValueStore, SessionSettings, StoreError};
use crate::strip::PhotoSize;
use image::DynamicImage;
use std::fmt;
use std::time::Instant;
use thiserror::Error;

/// Collaborator that has to be up before a photo can be taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Camera,
    Model,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Camera => f.write_str("Camera"),
            Component::Model => f.write_str("Background model"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BoothError {
    #[error("{0} not ready.")]
    NotReady(Component),
    #[error("Failed to capture frame: {0:#}")]
    Camera(anyhow::Error),
    #[error("Failed to segment frame: {0:#}")]
    Segmentation(anyhow::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Background(#[from] BackgroundLoadError),
}

pub struct Booth {
    session: CaptureSession,
    backdrop: Backdrop,
    photo_size: PhotoSize,
    mask_threshold: f32,
    camera: Option<Box<dyn CaptureSource>>,
    model: Option<Box<dyn SegmentationModel>>,
}

impl Booth {
    pub fn new(settings: SessionSettings, config: &SessionConfig) -> Result<Self, BoothError> {
        let session = CaptureSession::new(config.total_slots, settings.max_photos)?;
        tracing::info!(
            "Session: {} of {} slots, {} photos, background {}",
            settings.max_photos,
            config.total_slots,
            settings.photo_size,
            settings.background.describe()
        );
        Ok(Self {
            session,
            backdrop: Backdrop::new(settings.background),
            photo_size: settings.photo_size,
            mask_threshold: config.mask_threshold,
            camera: None,
            model: None,
        })
    }

    /// Start a session from the settings saved on the configuration page
    pub fn from_store(store: &dyn KeyValueStore, config: &SessionConfig) -> Result<Self, BoothError> {
        let settings = SessionSettings::load(store, config)?;
        Self::new(settings, config)
    }

    /// Pick up the slots saved by an earlier run of this session.
    ///
    /// Photos stored in slots the current photo count disables are left
    /// out with a warning.
    pub fn restore_from(&mut self, store: &dyn KeyValueStore) -> Result<usize, BoothError> {
        let stored = store::load_captured_slots(store)?;
        if stored.is_empty() {
            tracing::info!("No stored photos to restore");
            return Ok(0);
        }
        let max_photos = self.session.max_photos();
        let dropped = stored
            .iter()
            .skip(max_photos)
            .filter(|shot| shot.is_some())
            .count();
        if dropped > 0 {
            tracing::warn!(
                "Dropping {} stored photo(s) beyond the {} photo(s) of this session",
                dropped,
                max_photos
            );
        }

        let slots = stored
            .into_iter()
            .map(|shot| shot.map_or(Slot::Empty, Slot::Image))
            .collect();
        self.session = CaptureSession::restore(self.session.total_slots(), max_photos, slots)?;
        let filled = self.session.filled_count();
        tracing::info!("Restored {} stored photo(s)", filled);
        Ok(filled)
    }

    pub fn attach_camera(&mut self, camera: Box<dyn CaptureSource>) {
        let (width, height) = camera.resolution();
        tracing::info!("Camera attached ({}x{})", width, height);
        self.camera = Some(camera);
    }

    pub fn attach_model(&mut self, mut model: Box<dyn SegmentationModel>) {
        model.reset_state();
        tracing::info!("Segmentation model attached");
        self.model = Some(model);
    }

    pub fn is_ready(&self) -> bool {
        self.camera.is_some() && self.model.is_some()
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn backdrop(&self) -> &Backdrop {
        &self.backdrop
    }

    pub fn photo_size(&self) -> PhotoSize {
        self.photo_size
    }

    /// Take one photo: grab a frame, segment it, composite it into the
    /// next slot. Returns the slot written.
    pub fn snap(&mut self) -> Result<usize, BoothError> {
        let model = self.model.as_mut().ok_or(BoothError::NotReady(Component::Model))?;
        let camera = self.camera.as_mut().ok_or(BoothError::NotReady(Component::Camera))?;

        if self.session.next_target().is_none() {
            return Err(SessionError::Capacity {
                max_photos: self.session.max_photos(),
            }
            .into());
        }

        let start = Instant::now();
        let frame = camera.capture_frame().map_err(BoothError::Camera)?;
        let mask = model
            .segment_mask(&frame, self.mask_threshold)
            .map_err(BoothError::Segmentation)?;
        let frame = DynamicImage::ImageRgb8(frame).to_rgba8();

        let slot = self.session.capture(&frame, &mask, &self.backdrop)?;
        tracing::info!(
            "Captured slot {} in {:.1}ms ({} of {} foreground pixels)",
            slot + 1,
            start.elapsed().as_secs_f64() * 1000.0,
            mask.foreground_count(),
            mask.as_slice().len()
        );
        Ok(slot)
    }

    pub fn select_retake(&mut self, index: usize) -> Result<(), BoothError> {
        self.session.select_retake(index)?;
        tracing::info!("Next photo retakes slot {}", index + 1);
        Ok(())
    }

    pub fn thumbnails(&self) -> Result<Vec<Thumbnail>, BoothError> {
        Ok(self.session.thumbnails(&self.backdrop)?)
    }

    /// Persist every slot for the result page and hand back the captures
    pub fn finish(&self, store: &mut dyn KeyValueStore) -> Result<FinishedCaptureSet, BoothError> {
        store::save_captured_shots(store, self.session.slots())?;
        let finished = self.session.finish();
        tracing::info!("Session finished with {} photo(s)", finished.len());
        Ok(finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::BackgroundSource;
    use crate::segmentation::StillMatte;
    use crate::store::MemoryStore;
    use image::RgbImage;

    struct Solid(u8);

    impl CaptureSource for Solid {
        fn capture_frame(&mut self) -> anyhow::Result<RgbImage> {
            Ok(RgbImage::from_pixel(4, 2, image::Rgb([self.0, self.0, self.0])))
        }

        fn resolution(&self) -> (u32, u32) {
            (4, 2)
        }
    }

    fn booth(max_photos: usize) -> Booth {
        let settings = SessionSettings {
            max_photos,
            photo_size: PhotoSize::Square,
            background: BackgroundSource::parse("#00ff00").unwrap(),
        };
        Booth::new(settings, &SessionConfig::default()).unwrap()
    }

    fn half_matte() -> Box<StillMatte> {
        Box::new(StillMatte::new(vec![1.0, 0.0], 2, 1).unwrap())
    }

    #[test]
    fn test_snap_requires_model_then_camera() {
        let mut booth = booth(2);
        assert!(matches!(booth.snap(), Err(BoothError::NotReady(Component::Model))));
        booth.attach_model(half_matte());
        let err = booth.snap().unwrap_err();
        assert_eq!(err.to_string(), "Camera not ready.");
        assert!(!booth.is_ready());
    }

    #[test]
    fn test_snap_composites_and_finishes() {
        let mut booth = booth(2);
        booth.attach_model(half_matte());
        booth.attach_camera(Box::new(Solid(200)));

        assert_eq!(booth.snap().unwrap(), 0);
        assert_eq!(booth.snap().unwrap(), 1);
        assert!(matches!(
            booth.snap(),
            Err(BoothError::Session(SessionError::Capacity { max_photos: 2 }))
        ));

        let capture = booth.session().slot(0).unwrap().image().unwrap();
        // Left half subject, right half background
        assert_eq!(*capture.get_pixel(0, 0), image::Rgba([200, 200, 200, 255]));
        assert_eq!(*capture.get_pixel(3, 1), image::Rgba([0, 255, 0, 255]));

        let mut store = MemoryStore::new();
        let finished = booth.finish(&mut store).unwrap();
        assert_eq!(finished.len(), 2);
        assert_eq!(store::load_captured_slots(&store).unwrap().len(), 4);
    }

    #[test]
    fn test_retake_through_booth() {
        let mut booth = booth(1);
        booth.attach_model(half_matte());
        booth.attach_camera(Box::new(Solid(10)));
        booth.snap().unwrap();
        assert!(booth.select_retake(1).is_err());
        booth.select_retake(0).unwrap();
        assert_eq!(booth.snap().unwrap(), 0);
        assert_eq!(booth.thumbnails().unwrap().len(), 4);
    }

    #[test]
    fn test_restore_from_store() {
        let mut first = booth(3);
        first.attach_model(half_matte());
        first.attach_camera(Box::new(Solid(50)));
        first.select_retake(1).unwrap();
        first.snap().unwrap();
        let mut store = MemoryStore::new();
        first.finish(&mut store).unwrap();

        let mut second = booth(3);
        assert_eq!(second.restore_from(&store).unwrap(), 1);
        assert!(second.session().slot(0).unwrap().is_empty());
        assert!(!second.session().slot(1).unwrap().is_empty());

        let mut fresh = booth(3);
        assert_eq!(fresh.restore_from(&MemoryStore::new()).unwrap(), 0);
    }

    #[test]
    fn test_restore_after_lowering_quantity() {
        let mut first = booth(4);
        first.attach_model(half_matte());
        first.attach_camera(Box::new(Solid(50)));
        for _ in 0..4 {
            first.snap().unwrap();
        }
        let mut store = MemoryStore::new();
        first.finish(&mut store).unwrap();

        let mut second = booth(2);
        assert_eq!(second.restore_from(&store).unwrap(), 2);
        assert!(second.session().is_full());
        assert_eq!(second.finish(&mut store).unwrap().len(), 2);

        let thumbs = second.thumbnails().unwrap();
        assert!(thumbs[3].disabled);
        assert!(!thumbs[3].filled);
    }
}
