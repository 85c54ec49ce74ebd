mod preprocess;
#[cfg(feature = "rvm")]
mod rvm;
mod still;
pub mod types;

pub use preprocess::Preprocessor;
#[cfg(feature = "rvm")]
pub use rvm::RobustVideoMatting;
pub use still::StillMatte;
pub use types::{Mask, MaskError, Matte, SegmentationModel};

use anyhow::Result;
use std::path::Path;

/// Create the default person segmentation model (RVM)
#[cfg(feature = "rvm")]
pub fn create_default_model<P: AsRef<Path>>(model_path: P) -> Result<Box<dyn SegmentationModel>> {
    let model = RobustVideoMatting::new(model_path)?;
    Ok(Box::new(model))
}

#[cfg(not(feature = "rvm"))]
pub fn create_default_model<P: AsRef<Path>>(model_path: P) -> Result<Box<dyn SegmentationModel>> {
    anyhow::bail!(
        "cannot load {}: photobooth was built without the `rvm` feature",
        model_path.as_ref().display()
    )
}

/// Load a fixed matte image as a segmentation model
pub fn open_still_matte<P: AsRef<Path>>(path: P) -> Result<Box<dyn SegmentationModel>> {
    Ok(Box::new(StillMatte::open(path)?))
}
