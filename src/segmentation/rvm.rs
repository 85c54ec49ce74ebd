use super::preprocess::Preprocessor;
use super::types::{Matte, SegmentationModel};
use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{Array4, ArrayD};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

/// RobustVideoMatting segmentation model
///
/// This model uses recurrent connections to maintain temporal consistency.
/// Hidden states (r1-r4) are carried between frames for smooth results.
pub struct RobustVideoMatting {
    session: Session,
    preprocessor: Preprocessor,

    // Recurrent hidden states, fed back on the next frame
    hidden: RecurrentState,

    // Downsample ratio for hidden states
    downsample_ratio: f32,
}

impl RobustVideoMatting {
    /// Create a new RVM model from an ONNX file
    ///
    /// # Default Configuration
    /// - Input size: 512x512
    /// - Downsample ratio: 0.25 (hidden states are 1/4 of input resolution)
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading RVM model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!("RVM model loaded successfully");

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(512, 512),
            hidden: RecurrentState::default(),
            downsample_ratio: 0.25,
        })
    }
}

/// Zeroed states for a fresh sequence, sized from the model input
fn zero_hidden_states((width, height): (u32, u32), downsample_ratio: f32) -> HiddenStates {
    let h = (height as f32 * downsample_ratio) as usize;
    let w = (width as f32 * downsample_ratio) as usize;

    tracing::debug!("Initializing hidden states to {}x{}", w, h);

    [
        Array4::<f32>::zeros((1, 16, h, w)).into_dyn(),
        Array4::<f32>::zeros((1, 20, h / 2, w / 2)).into_dyn(),
        Array4::<f32>::zeros((1, 24, h / 4, w / 4)).into_dyn(),
        Array4::<f32>::zeros((1, 28, h / 8, w / 8)).into_dyn(),
    ]
}

type HiddenStates = [ArrayD<f32>; 4];

/// Hidden states carried between frames.
///
/// The states only move forward when a step succeeds; a failed inference
/// leaves the previous states in place for the next frame.
#[derive(Debug, Default)]
struct RecurrentState {
    states: Option<HiddenStates>,
}

impl RecurrentState {
    fn advance<T>(
        &mut self,
        init: impl FnOnce() -> HiddenStates,
        step: impl FnOnce(&HiddenStates) -> Result<(T, HiddenStates)>,
    ) -> Result<T> {
        let current = self.states.get_or_insert_with(init);
        let (output, next) = step(current)?;
        self.states = Some(next);
        Ok(output)
    }

    fn reset(&mut self) {
        self.states = None;
    }
}

impl SegmentationModel for RobustVideoMatting {
    fn segment(&mut self, frame: &RgbImage) -> Result<Matte> {
        let _span = tracing::debug_span!("rvm_segment").entered();

        let input_tensor = self.preprocessor.preprocess(frame)?;
        let target = self.preprocessor.target_size();
        let ratio = self.downsample_ratio;
        let session = &mut self.session;

        let pha = self.hidden.advance(
            || zero_hidden_states(target, ratio),
            |[r1, r2, r3, r4]| {
                // RVM expects: src (frame), r1, r2, r3, r4
                let outputs = session
                    .run(ort::inputs![
                        TensorRef::from_array_view(input_tensor.view())?,
                        TensorRef::from_array_view(r1.view())?,
                        TensorRef::from_array_view(r2.view())?,
                        TensorRef::from_array_view(r3.view())?,
                        TensorRef::from_array_view(r4.view())?,
                    ])
                    .context("Failed to run inference")?;

                // Outputs: fgr, pha, r1..r4. Only the alpha matte and states are kept.
                let pha = outputs[1].try_extract_array::<f32>()?.to_owned();
                let mut next = Vec::with_capacity(4);
                for index in 2..6 {
                    next.push(outputs[index].try_extract_array::<f32>()?.to_owned());
                }
                let next: HiddenStates = next
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("RVM returned an unexpected number of states"))?;
                Ok((pha, next))
            },
        )?;

        // Matte shape: [1, 1, H, W]
        let shape = pha.shape();
        if shape.len() != 4 {
            anyhow::bail!("unexpected matte shape {:?}", shape);
        }
        let matte_height = shape[2] as u32;
        let matte_width = shape[3] as u32;
        let matte_flat: Vec<f32> = pha.iter().copied().collect();

        let (frame_width, frame_height) = frame.dimensions();
        Preprocessor::postprocess_matte(
            &matte_flat,
            matte_width,
            matte_height,
            frame_width,
            frame_height,
        )
    }

    fn reset_state(&mut self) {
        tracing::info!("Resetting RVM hidden states");
        self.hidden.reset();
    }

    fn input_size(&self) -> (u32, u32) {
        self.preprocessor.target_size()
    }
}
