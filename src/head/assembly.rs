//! Wiring between an external prediction network and the anchor grid.
//!
//! The network itself lives outside this crate. It plugs in through two
//! small capability traits, one per prediction branch, and `SsdHead` does
//! the explicit assembly: run both branches, hold them to the channel
//! contract, and flatten the per-level maps into one candidate set aligned
//! to the anchor ordering.

use ndarray::{Array2, Array3};

use crate::anchors::AnchorSet;
use crate::errors::DetectError;

/// Produces one box-regression map per feature level.
///
/// For level `l` with `A_l` anchors per location the map must be shaped
/// `[A_l * 4, H_l, W_l]`, levels in anchor-generator order. Channel slot
/// `a * 4 + c` carries offset component `c` of per-location anchor `a`.
pub trait RegressionHead {
    fn forward(&self, features: &[Array3<f32>]) -> anyhow::Result<Vec<Array3<f32>>>;
}

/// Produces one classification map per feature level, shaped
/// `[A_l * num_classes, H_l, W_l]` under the same channel convention.
pub trait ClassificationHead {
    fn forward(&self, features: &[Array3<f32>]) -> anyhow::Result<Vec<Array3<f32>>>;
}

/// Raw per-anchor model output, flattened across levels. Row `i` of both
/// arrays belongs to anchor `i`. Owned by the inference call that produced
/// it and consumed once by decoding and suppression.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSet {
    /// `[N, 4]` regression offsets.
    pub regression: Array2<f32>,

    /// `[N, num_classes]` per-class scores.
    pub scores: Array2<f32>,
}

impl CandidateSet {
    pub fn num_candidates(&self) -> usize {
        self.regression.nrows()
    }

    pub fn num_classes(&self) -> usize {
        self.scores.ncols()
    }
}

/// The assembled detection head: a regression branch and a classification
/// branch composed side by side. No deeper hierarchy; the two traits are
/// the only seams.
#[derive(Debug)]
pub struct SsdHead<R, C> {
    regression: R,
    classification: C,
    num_classes: usize,
}

impl<R: RegressionHead, C: ClassificationHead> SsdHead<R, C> {
    pub fn new(regression: R, classification: C, num_classes: usize) -> Self {
        log::info!("Assembled SSD head with {} classes", num_classes);
        Self {
            regression,
            classification,
            num_classes,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Runs both branches over the feature maps and flattens their output
    /// into a [`CandidateSet`]. Every level is validated against the anchor
    /// configuration before anything is concatenated.
    pub fn forward(
        &self,
        features: &[Array3<f32>],
        anchors: &AnchorSet,
    ) -> anyhow::Result<CandidateSet> {
        let reg_maps = self.regression.forward(features)?;
        let cls_maps = self.classification.forward(features)?;

        let regression = flatten_levels(&reg_maps, anchors, 4, "regression")?;
        let scores = flatten_levels(&cls_maps, anchors, self.num_classes, "classification")?;

        Ok(CandidateSet { regression, scores })
    }
}

/// Flattens per-level `[A * k, H, W]` maps into an `[N, k]` array whose
/// rows follow the anchor emission order: level-major, row-major cells,
/// per-location anchor slots in square-first order.
fn flatten_levels(
    maps: &[Array3<f32>],
    anchors: &AnchorSet,
    values_per_anchor: usize,
    kind: &'static str,
) -> crate::Result<Array2<f32>> {
    if maps.len() != anchors.num_levels() {
        return Err(DetectError::LevelCount {
            expected: anchors.num_levels(),
            got: maps.len(),
        });
    }

    let mut out = Array2::<f32>::zeros((anchors.len(), values_per_anchor));
    let mut row = 0;

    for (level, map) in maps.iter().enumerate() {
        let (fw, fh) = anchors.level_sizes()[level];
        let slots = anchors.anchors_per_location()[level];
        let (channels, h, w) = map.dim();

        if (w, h) != (fw, fh) {
            return Err(DetectError::MapSize {
                level,
                expected_w: fw,
                expected_h: fh,
                got_w: w,
                got_h: h,
            });
        }
        if channels != slots * values_per_anchor {
            return Err(DetectError::ChannelMismatch {
                level,
                kind,
                expected: slots * values_per_anchor,
                got: channels,
            });
        }

        for j in 0..h {
            for i in 0..w {
                for slot in 0..slots {
                    for v in 0..values_per_anchor {
                        out[[row, v]] = map[[slot * values_per_anchor + v, j, i]];
                    }
                    row += 1;
                }
            }
        }
    }

    Ok(out)
}
