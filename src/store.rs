//! Persisted booth state: settings chosen before a session, the captures
//! it produced, and the strip direction override.

use crate::background::{BackgroundSelector, BackgroundSource};
use crate::config::SessionConfig;
use crate::data_uri::{self, DataUriError};
use crate::session::Slot;
use crate::strip::{PhotoSize, StackDirection};
use image::RgbaImage;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod keys {
    pub const PHOTO_QUANTITY: &str = "photoQuantity";
    pub const PHOTO_SIZE: &str = "photoSize";
    pub const PHOTO_BACKGROUND: &str = "photoBackground";
    pub const CAPTURED_SHOTS: &str = "capturedShots";
    pub const ORIENTATION: &str = "orientation";
}

/// Photo count used when none is stored
pub const DEFAULT_PHOTO_QUANTITY: usize = 4;

/// Photo size the strip assumes when none is stored
pub const STRIP_DEFAULT_PHOTO_SIZE: PhotoSize = PhotoSize::Square;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read store '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write store '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Store '{path}' is not a JSON object of strings: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("'{key}' holds malformed data: {reason}")]
    BadValue { key: &'static str, reason: String },
    #[error("captured shot {index} could not be decoded: {reason}")]
    BadShot { index: usize, reason: String },
    #[error("failed to encode capture: {0}")]
    Encode(#[from] DataUriError),
}

/// String key-value persistence
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A JSON object on disk, rewritten on every change
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?
        } else {
            tracing::debug!("No store at {}, starting empty", path.display());
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let write_err = |source: std::io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        std::fs::write(&self.path, json).map_err(write_err)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// Settings chosen on the configuration page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub max_photos: usize,
    pub photo_size: PhotoSize,
    pub background: BackgroundSource,
}

impl SessionSettings {
    /// Read settings, falling back to defaults for anything missing or
    /// unusable
    pub fn load(store: &dyn KeyValueStore, config: &SessionConfig) -> Result<Self, StoreError> {
        let requested = store
            .get(keys::PHOTO_QUANTITY)?
            .as_deref()
            .and_then(parse_leading_int)
            .filter(|&q| q != 0)
            .unwrap_or(DEFAULT_PHOTO_QUANTITY as i64);
        let max_slots = config.total_slots.max(1);
        let max_photos = requested.clamp(1, max_slots as i64) as usize;
        if max_photos as i64 != requested {
            tracing::warn!(
                "Photo quantity {} out of range, using {}",
                requested,
                max_photos
            );
        }

        let photo_size = load_photo_size(store, PhotoSize::default())?;

        let mut selector = BackgroundSelector::new(config.default_background.clone());
        if let Some(setting) = store.get(keys::PHOTO_BACKGROUND)? {
            if let Err(e) = selector.select_setting(&setting) {
                tracing::warn!("Ignoring stored background: {}", e);
            }
        }

        Ok(Self {
            max_photos,
            photo_size,
            background: selector.resolve(),
        })
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
        store.set(keys::PHOTO_SIZE, self.photo_size.as_str())?;
        store.set(keys::PHOTO_QUANTITY, &self.max_photos.to_string())?;
        store.set(keys::PHOTO_BACKGROUND, &self.background.to_setting())
    }
}

/// Store every slot, `null` for empties, images as PNG data URIs
pub fn save_captured_shots(store: &mut dyn KeyValueStore, slots: &[Slot]) -> Result<(), StoreError> {
    let shots = slots
        .iter()
        .map(|slot| slot.image().map(data_uri::encode_png).transpose())
        .collect::<Result<Vec<Option<String>>, _>>()?;
    let json = serde_json::to_string(&shots).map_err(|e| StoreError::BadValue {
        key: keys::CAPTURED_SHOTS,
        reason: e.to_string(),
    })?;
    store.set(keys::CAPTURED_SHOTS, &json)
}

/// Stored shots slot by slot; empty entries come back as `None`
pub fn load_captured_slots(store: &dyn KeyValueStore) -> Result<Vec<Option<RgbaImage>>, StoreError> {
    let Some(json) = store.get(keys::CAPTURED_SHOTS)? else {
        return Ok(Vec::new());
    };
    let shots: Vec<Option<String>> =
        serde_json::from_str(&json).map_err(|e| StoreError::BadValue {
            key: keys::CAPTURED_SHOTS,
            reason: e.to_string(),
        })?;

    shots
        .into_iter()
        .enumerate()
        .map(|(index, shot)| match shot {
            Some(uri) if !uri.trim().is_empty() => decode_shot(index, &uri).map(Some),
            _ => Ok(None),
        })
        .collect()
}

/// Stored shots with the empty slots dropped
pub fn load_captured_shots(store: &dyn KeyValueStore) -> Result<Vec<RgbaImage>, StoreError> {
    Ok(load_captured_slots(store)?.into_iter().flatten().collect())
}

fn decode_shot(index: usize, uri: &str) -> Result<RgbaImage, StoreError> {
    let bad = |reason: String| StoreError::BadShot { index, reason };
    let (_, bytes) = data_uri::decode(uri).map_err(|e| bad(e.to_string()))?;
    let image = image::load_from_memory(&bytes).map_err(|e| bad(e.to_string()))?;
    Ok(image.to_rgba8())
}

/// Leading integer of a setting: optional sign then digits, anything
/// after them ignored ("3abc" and "3.5" read as 3)
fn parse_leading_int(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let (negative, rest) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let magnitude: i64 = rest[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Stored photo size, or `fallback` when missing or unknown
pub fn load_photo_size(
    store: &dyn KeyValueStore,
    fallback: PhotoSize,
) -> Result<PhotoSize, StoreError> {
    Ok(match store.get(keys::PHOTO_SIZE)? {
        Some(size) => size.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown photo size '{}', using {}", size, fallback);
            fallback
        }),
        None => fallback,
    })
}

/// Photo size for laying out a strip of stored shots
pub fn load_strip_photo_size(store: &dyn KeyValueStore) -> Result<PhotoSize, StoreError> {
    load_photo_size(store, STRIP_DEFAULT_PHOTO_SIZE)
}

pub fn load_orientation(store: &dyn KeyValueStore) -> Result<Option<StackDirection>, StoreError> {
    Ok(match store.get(keys::ORIENTATION)? {
        Some(value) => match value.parse() {
            Ok(direction) => Some(direction),
            Err(_) => {
                tracing::warn!("Ignoring unknown orientation '{}'", value);
                None
            }
        },
        None => None,
    })
}

pub fn save_orientation(
    store: &mut dyn KeyValueStore,
    direction: StackDirection,
) -> Result<(), StoreError> {
    store.set(keys::ORIENTATION, direction.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn config() -> SessionConfig {
        SessionConfig::default()
    }

    #[test]
    fn test_settings_defaults() {
        let store = MemoryStore::new();
        let settings = SessionSettings::load(&store, &config()).unwrap();
        assert_eq!(settings.max_photos, 4);
        assert_eq!(settings.photo_size, PhotoSize::Landscape);
        assert_eq!(
            settings.background,
            BackgroundSource::StaticImage(PathBuf::from(crate::background::DEFAULT_BACKGROUND))
        );
    }

    #[test]
    fn test_settings_fallbacks() {
        let mut store = MemoryStore::new();
        store.set(keys::PHOTO_QUANTITY, "zero").unwrap();
        store.set(keys::PHOTO_SIZE, "Panorama").unwrap();
        store.set(keys::PHOTO_BACKGROUND, "no-such-color").unwrap();
        let settings = SessionSettings::load(&store, &config()).unwrap();
        assert_eq!(settings.max_photos, 4);
        assert_eq!(settings.photo_size, PhotoSize::Landscape);
        assert!(settings.background.is_image());

        store.set(keys::PHOTO_QUANTITY, "9").unwrap();
        let settings = SessionSettings::load(&store, &config()).unwrap();
        assert_eq!(settings.max_photos, 4);

        store.set(keys::PHOTO_QUANTITY, "-2").unwrap();
        let settings = SessionSettings::load(&store, &config()).unwrap();
        assert_eq!(settings.max_photos, 1);
    }

    #[test]
    fn test_quantity_reads_leading_digits() {
        let mut store = MemoryStore::new();
        for (stored, expected) in [("3abc", 3), ("2.5", 2), (" 1 photo", 1), ("0", 4), ("x3", 4)] {
            store.set(keys::PHOTO_QUANTITY, stored).unwrap();
            let settings = SessionSettings::load(&store, &config()).unwrap();
            assert_eq!(settings.max_photos, expected, "stored {:?}", stored);
        }
    }

    #[test]
    fn test_strip_photo_size_defaults_to_square() {
        let mut store = MemoryStore::new();
        assert_eq!(load_strip_photo_size(&store).unwrap(), PhotoSize::Square);
        assert_eq!(
            SessionSettings::load(&store, &config()).unwrap().photo_size,
            PhotoSize::Landscape
        );

        store.set(keys::PHOTO_SIZE, "Portrait").unwrap();
        assert_eq!(load_strip_photo_size(&store).unwrap(), PhotoSize::Portrait);
    }

    #[test]
    fn test_settings_round_trip() {
        let mut store = MemoryStore::new();
        let settings = SessionSettings {
            max_photos: 2,
            photo_size: PhotoSize::Portrait,
            background: BackgroundSource::parse("rgb(1, 2, 3)").unwrap(),
        };
        settings.save(&mut store).unwrap();
        assert_eq!(store.get(keys::PHOTO_QUANTITY).unwrap().as_deref(), Some("2"));
        assert_eq!(SessionSettings::load(&store, &config()).unwrap(), settings);
    }

    #[test]
    fn test_captured_shots_keep_slot_positions() {
        let mut store = MemoryStore::new();
        let a = RgbaImage::from_pixel(2, 2, Rgba([1, 0, 0, 255]));
        let b = RgbaImage::from_pixel(2, 2, Rgba([2, 0, 0, 255]));
        let slots = vec![Slot::Empty, Slot::Image(a.clone()), Slot::Empty, Slot::Image(b.clone())];
        save_captured_shots(&mut store, &slots).unwrap();

        let raw = store.get(keys::CAPTURED_SHOTS).unwrap().unwrap();
        assert!(raw.starts_with("[null,\"data:image/png;base64,"));

        let by_slot = load_captured_slots(&store).unwrap();
        assert_eq!(by_slot, vec![None, Some(a.clone()), None, Some(b.clone())]);
        assert_eq!(load_captured_shots(&store).unwrap(), vec![a, b]);
    }

    #[test]
    fn test_blank_shots_are_dropped() {
        let mut store = MemoryStore::new();
        store.set(keys::CAPTURED_SHOTS, r#"[null, "", "   "]"#).unwrap();
        assert!(load_captured_shots(&store).unwrap().is_empty());
        assert!(load_captured_shots(&MemoryStore::new()).unwrap().is_empty());
    }

    #[test]
    fn test_undecodable_shot() {
        let mut store = MemoryStore::new();
        store.set(keys::CAPTURED_SHOTS, r#"["data:image/png;base64,AAAA"]"#).unwrap();
        assert!(matches!(
            load_captured_shots(&store),
            Err(StoreError::BadShot { index: 0, .. })
        ));
    }

    #[test]
    fn test_json_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.remove("b").unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(reopened.get("b").unwrap(), None);
    }

    #[test]
    fn test_json_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(JsonFileStore::open(&path), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_orientation_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(load_orientation(&store).unwrap(), None);
        save_orientation(&mut store, StackDirection::Horizontal).unwrap();
        assert_eq!(load_orientation(&store).unwrap(), Some(StackDirection::Horizontal));
        store.set(keys::ORIENTATION, "diagonal").unwrap();
        assert_eq!(load_orientation(&store).unwrap(), None);
    }
}
