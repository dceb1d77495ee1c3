//! Default (prior) box generation.
//!
//! Anchors tile every feature map cell with one square box plus one
//! rectangle per configured aspect ratio, in normalized `[0, 1]` image
//! coordinates. The emission order is an external contract: level-major,
//! then row-major over cells, then square-first per location. Prediction
//! head channels align to this order 1:1.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::common::SsdBox;
use crate::errors::DetectError;
use crate::Result;

/// Anchor grid configuration. Plain values, no file I/O.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// Per-level feature map sizes as `(width, height)`.
    pub feature_maps: Vec<(usize, usize)>,

    /// Per-level aspect ratio lists. An empty list still yields the square
    /// anchor for that level. Reciprocals are not implied; list them.
    pub aspect_ratios: Vec<Vec<f32>>,

    /// Scale assigned to the first level.
    pub min_ratio: f32,

    /// Scale assigned to the last level.
    pub max_ratio: f32,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            feature_maps: vec![],
            aspect_ratios: vec![],
            min_ratio: 0.2,
            max_ratio: 0.95,
        }
    }
}

impl AnchorConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_feature_maps(mut self, maps: &[(usize, usize)]) -> Self {
        self.feature_maps = maps.to_vec();
        self
    }

    pub fn with_aspect_ratios(mut self, ratios: &[&[f32]]) -> Self {
        self.aspect_ratios = ratios.iter().map(|r| r.to_vec()).collect();
        self
    }

    pub fn with_scale_range(mut self, min_ratio: f32, max_ratio: f32) -> Self {
        self.min_ratio = min_ratio;
        self.max_ratio = max_ratio;
        self
    }

    pub fn num_levels(&self) -> usize {
        self.feature_maps.len()
    }

    /// Anchors emitted per feature map cell, per level.
    pub fn anchors_per_location(&self) -> Vec<usize> {
        self.aspect_ratios.iter().map(|r| 1 + r.len()).collect()
    }

    /// Per-level scales, linearly interpolated between `min_ratio` and
    /// `max_ratio`. A single level degenerates to `min_ratio`.
    pub fn scales(&self) -> Vec<f32> {
        let k = self.num_levels();
        if k <= 1 {
            return vec![self.min_ratio; k];
        }
        (0..k)
            .map(|i| self.min_ratio + (self.max_ratio - self.min_ratio) * i as f32 / (k - 1) as f32)
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.feature_maps.is_empty() {
            return Err(DetectError::AnchorConfig("no feature maps configured".into()));
        }
        if self.aspect_ratios.len() != self.feature_maps.len() {
            return Err(DetectError::AnchorConfig(format!(
                "{} aspect ratio lists for {} feature maps",
                self.aspect_ratios.len(),
                self.feature_maps.len()
            )));
        }
        if !(self.min_ratio > 0. && self.min_ratio <= self.max_ratio) {
            return Err(DetectError::AnchorConfig(format!(
                "bad scale range [{}, {}]",
                self.min_ratio, self.max_ratio
            )));
        }
        for (level, (w, h)) in self.feature_maps.iter().enumerate() {
            if *w == 0 || *h == 0 {
                return Err(DetectError::AnchorConfig(format!(
                    "level {} has an empty {}x{} feature map",
                    level, w, h
                )));
            }
        }
        for (level, ratios) in self.aspect_ratios.iter().enumerate() {
            if ratios.iter().any(|r| *r <= 0.) {
                return Err(DetectError::AnchorConfig(format!(
                    "level {} has a non-positive aspect ratio",
                    level
                )));
            }
        }
        Ok(())
    }

    /// Generates the anchor grid. Deterministic: identical configuration
    /// yields an identical ordered set.
    pub fn build(&self) -> Result<AnchorSet> {
        self.validate()?;

        let scales = self.scales();
        let per_location = self.anchors_per_location();
        let total: usize = self
            .feature_maps
            .iter()
            .zip(&per_location)
            .map(|((w, h), a)| w * h * a)
            .sum();

        let mut boxes = Array2::<f32>::zeros((total, 4));
        let mut level_counts = Vec::with_capacity(self.num_levels());
        let mut row = 0;

        for (level, &(fw, fh)) in self.feature_maps.iter().enumerate() {
            let s = scales[level];
            let start = row;
            for j in 0..fh {
                let cy = (j as f32 + 0.5) / fh as f32;
                for i in 0..fw {
                    let cx = (i as f32 + 0.5) / fw as f32;

                    boxes[[row, 0]] = cx;
                    boxes[[row, 1]] = cy;
                    boxes[[row, 2]] = s;
                    boxes[[row, 3]] = s;
                    row += 1;

                    for &ratio in &self.aspect_ratios[level] {
                        let sq = ratio.sqrt();
                        boxes[[row, 0]] = cx;
                        boxes[[row, 1]] = cy;
                        boxes[[row, 2]] = s * sq;
                        boxes[[row, 3]] = s / sq;
                        row += 1;
                    }
                }
            }
            level_counts.push(row - start);
        }

        log::info!(
            "Generated {} anchors over {} feature levels",
            total,
            self.num_levels()
        );

        Ok(AnchorSet {
            boxes,
            level_counts,
            level_sizes: self.feature_maps.clone(),
            anchors_per_location: per_location,
        })
    }
}

/// The generated anchor grid. Built once per model configuration and
/// read-only afterwards; sharing it across threads is safe.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorSet {
    boxes: Array2<f32>,
    level_counts: Vec<usize>,
    level_sizes: Vec<(usize, usize)>,
    anchors_per_location: Vec<usize>,
}

impl AnchorSet {
    /// All anchors as an `[N, 4]` array in `(cx, cy, w, h)` layout.
    pub fn boxes(&self) -> &Array2<f32> {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_levels(&self) -> usize {
        self.level_counts.len()
    }

    /// Anchor count per feature level, in emission order.
    pub fn level_counts(&self) -> &[usize] {
        &self.level_counts
    }

    /// Feature map `(width, height)` per level.
    pub fn level_sizes(&self) -> &[(usize, usize)] {
        &self.level_sizes
    }

    /// Anchors per feature map cell, per level.
    pub fn anchors_per_location(&self) -> &[usize] {
        &self.anchors_per_location
    }

    /// The anchor at index `i` in corner form.
    pub fn get(&self, i: usize) -> SsdBox {
        SsdBox::default().with_cxcy_wh(
            self.boxes[[i, 0]],
            self.boxes[[i, 1]],
            self.boxes[[i, 2]],
            self.boxes[[i, 3]],
        )
    }

    /// Row range covered by the given level.
    pub fn level_range(&self, level: usize) -> std::ops::Range<usize> {
        let start: usize = self.level_counts[..level].iter().sum();
        start..start + self.level_counts[level]
    }
}
