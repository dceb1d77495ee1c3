mod errors;
pub mod anchors;
pub mod coder;
pub mod common;
pub mod head;
pub mod matcher;
pub mod suppression;

use std::time::Instant;

use crate::common::{ModelPreset, SsdDetection};
use crate::head::{CandidateSet, SsdPipeline};

pub use errors::DetectError;

pub type Result<T, E = DetectError> = std::result::Result<T, E>;

/// Builds the anchor grid, coder and post-processing defaults for one of
/// the registered model configurations.
pub fn init_pipeline(preset: ModelPreset) -> anyhow::Result<SsdPipeline> {
    log::info!("Initializing detection pipeline for {}", preset.name());
    SsdPipeline::from_preset(preset)
}

/// Runs post-processing for a single image worth of raw model output.
pub fn run_detection(
    pipeline: &SsdPipeline,
    candidates: &CandidateSet,
    image_size: (u32, u32),
) -> anyhow::Result<Vec<SsdDetection>> {
    let now = Instant::now();

    let detections = pipeline.detect(candidates, image_size)?;

    log::debug!("Processing time: {:?}", now.elapsed());

    Ok(detections)
}
