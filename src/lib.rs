//! photobooth library crate.
//!
//! Capture sessions with background replacement, and strip assembly of
//! the finished photos.

pub mod background;
pub mod booth;
pub mod capture;
pub mod composite;
pub mod config;
pub mod data_uri;
pub mod segmentation;
pub mod session;
pub mod store;
pub mod strip;

pub use background::{Backdrop, BackgroundSelector, BackgroundSource};
pub use booth::{Booth, BoothError};
pub use composite::{CompositeError, FrameCompositor};
pub use config::Config;
pub use segmentation::Mask;
pub use session::{CaptureSession, FinishedCaptureSet, SessionError, Slot};
pub use strip::{FrameSkin, PhotoSize, StackDirection, StripAssembler, StripLayout};
