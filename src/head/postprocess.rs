//! Turns a raw candidate set into final detections: decode, score, filter,
//! suppress, cap.

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::anchors::AnchorSet;
use crate::coder::BoxCoder;
use crate::common::{remove_small_boxes, ModelPreset, SsdBox, SsdDetection};
use crate::errors::DetectError;
use crate::head::CandidateSet;
use crate::suppression::batched_nms;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostprocessConfig {
    /// Per-class score floor applied before suppression.
    pub score_threshold: f32,

    /// Overlap threshold for class-aware suppression.
    pub iou_threshold: f32,

    /// Candidates kept per class ahead of suppression.
    pub topk_candidates: usize,

    /// Cap on detections returned per image.
    pub detections_per_image: usize,

    /// Minimum box side in pixels; zero disables the filter.
    pub min_box_size: f32,

    /// Run a per-candidate softmax over the class scores. Off when the
    /// network already emits probabilities.
    pub apply_softmax: bool,

    /// Class index treated as background and never emitted.
    pub background_class: Option<usize>,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.001,
            iou_threshold: 0.55,
            topk_candidates: 300,
            detections_per_image: 300,
            min_box_size: 0.,
            apply_softmax: true,
            background_class: Some(0),
        }
    }
}

#[allow(dead_code)]
impl PostprocessConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_score_threshold(mut self, x: f32) -> Self {
        self.score_threshold = x;
        self
    }

    pub fn with_iou_threshold(mut self, x: f32) -> Self {
        self.iou_threshold = x;
        self
    }

    pub fn with_topk_candidates(mut self, n: usize) -> Self {
        self.topk_candidates = n;
        self
    }

    pub fn with_detections_per_image(mut self, n: usize) -> Self {
        self.detections_per_image = n;
        self
    }

    pub fn with_min_box_size(mut self, x: f32) -> Self {
        self.min_box_size = x;
        self
    }

    pub fn with_softmax(mut self, x: bool) -> Self {
        self.apply_softmax = x;
        self
    }

    pub fn with_background_class(mut self, x: Option<usize>) -> Self {
        self.background_class = x;
        self
    }
}

fn softmax_rows(scores: &Array2<f32>) -> Array2<f32> {
    let mut out = scores.clone();
    for mut row in out.outer_iter_mut() {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            sum += *v;
        }
        if sum > 0. {
            for v in row.iter_mut() {
                *v /= sum;
            }
        }
    }
    out
}

/// Post-processes one image worth of raw candidates into detections,
/// sorted by descending score.
pub fn postprocess(
    candidates: &CandidateSet,
    anchors: &AnchorSet,
    coder: &BoxCoder,
    config: &PostprocessConfig,
    image_size: (u32, u32),
) -> crate::Result<Vec<SsdDetection>> {
    if candidates.num_candidates() != anchors.len()
        || candidates.scores.nrows() != anchors.len()
    {
        return Err(DetectError::CandidateShape(format!(
            "{} candidates against {} anchors",
            candidates.num_candidates(),
            anchors.len()
        )));
    }

    let decoded = coder.decode_batch(candidates.regression.view(), anchors)?;
    let scores = if config.apply_softmax {
        softmax_rows(&candidates.scores)
    } else {
        candidates.scores.clone()
    };

    let (iw, ih) = (image_size.0 as f32, image_size.1 as f32);
    let mut collected: Vec<SsdDetection> = Vec::new();

    for class in 0..candidates.num_classes() {
        if config.background_class == Some(class) {
            continue;
        }

        let mut class_dets: Vec<SsdDetection> = Vec::new();
        for i in 0..anchors.len() {
            let score = scores[[i, class]];
            if score <= config.score_threshold {
                continue;
            }
            let bbox = SsdBox::new(
                decoded[[i, 0]],
                decoded[[i, 1]],
                decoded[[i, 2]],
                decoded[[i, 3]],
            )
            .scaled(iw, ih)
            .clip_to_image(iw, ih);
            class_dets.push(SsdDetection::new(bbox, score, class));
        }

        if config.min_box_size > 0. {
            remove_small_boxes(&mut class_dets, config.min_box_size);
        }

        class_dets.sort_by(|d1, d2| d2.score.total_cmp(&d1.score));
        class_dets.truncate(config.topk_candidates);
        collected.extend(class_dets);
    }

    batched_nms(
        &mut collected,
        config.iou_threshold,
        Some(config.detections_per_image),
    );

    Ok(collected)
}

/// Batch variant of [`postprocess`]; images fan out across the rayon pool.
pub fn postprocess_batch(
    batch: &[CandidateSet],
    anchors: &AnchorSet,
    coder: &BoxCoder,
    config: &PostprocessConfig,
    image_sizes: &[(u32, u32)],
) -> crate::Result<Vec<Vec<SsdDetection>>> {
    if batch.len() != image_sizes.len() {
        return Err(DetectError::CandidateShape(format!(
            "{} candidate sets against {} image sizes",
            batch.len(),
            image_sizes.len()
        )));
    }

    batch
        .par_iter()
        .zip(image_sizes.par_iter())
        .map(|(candidates, size)| postprocess(candidates, anchors, coder, config, *size))
        .collect()
}

/// Everything needed to turn raw model output into detections for one
/// model configuration: the anchor grid, the coder it was trained against
/// and the post-processing knobs.
#[derive(Debug, Clone)]
pub struct SsdPipeline {
    anchors: AnchorSet,
    coder: BoxCoder,
    config: PostprocessConfig,
}

impl SsdPipeline {
    pub fn new(anchors: AnchorSet, coder: BoxCoder, config: PostprocessConfig) -> Self {
        Self {
            anchors,
            coder,
            config,
        }
    }

    pub fn from_preset(preset: ModelPreset) -> anyhow::Result<Self> {
        let anchors = preset.anchor_config().build()?;
        log::info!(
            "{}: {} anchors over {} levels, input {:?}",
            preset.name(),
            anchors.len(),
            anchors.num_levels(),
            preset.input_size(),
        );
        Ok(Self::new(anchors, preset.coder(), preset.postprocess_defaults()))
    }

    pub fn anchors(&self) -> &AnchorSet {
        &self.anchors
    }

    pub fn coder(&self) -> &BoxCoder {
        &self.coder
    }

    pub fn config(&self) -> &PostprocessConfig {
        &self.config
    }

    pub fn with_config(mut self, config: PostprocessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn detect(
        &self,
        candidates: &CandidateSet,
        image_size: (u32, u32),
    ) -> anyhow::Result<Vec<SsdDetection>> {
        let detections = postprocess(candidates, &self.anchors, &self.coder, &self.config, image_size)?;
        Ok(detections)
    }

    pub fn detect_batch(
        &self,
        batch: &[CandidateSet],
        image_sizes: &[(u32, u32)],
    ) -> anyhow::Result<Vec<Vec<SsdDetection>>> {
        let detections =
            postprocess_batch(batch, &self.anchors, &self.coder, &self.config, image_sizes)?;
        Ok(detections)
    }
}
