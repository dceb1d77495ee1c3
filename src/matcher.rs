//! Training-time assignment of ground-truth boxes to anchors.
//!
//! Each anchor takes the ground-truth box it overlaps best, when that
//! overlap clears the threshold. Every ground-truth box then force-claims
//! its own best anchor so none goes unmatched, which is the SSD matching
//! strategy. Ties resolve to the lowest index on both sides.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::anchors::AnchorSet;
use crate::coder::BoxCoder;
use crate::common::SsdBox;
use crate::Result;

/// Match value for anchors not assigned to any ground-truth box.
pub const BACKGROUND: isize = -1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorMatcher {
    pub iou_threshold: f32,
}

impl Default for AnchorMatcher {
    fn default() -> Self {
        Self { iou_threshold: 0.5 }
    }
}

impl AnchorMatcher {
    pub fn new(iou_threshold: f32) -> Self {
        Self { iou_threshold }
    }

    /// Returns, per anchor, the index of the matched ground-truth box or
    /// [`BACKGROUND`]. Ground-truth boxes with negative dimensions are
    /// rejected.
    pub fn match_anchors(&self, gt: &[SsdBox], anchors: &AnchorSet) -> Result<Vec<isize>> {
        let mut matches = vec![BACKGROUND; anchors.len()];
        let mut matched_iou = vec![0f32; anchors.len()];

        let mut forced = Vec::with_capacity(gt.len());

        for (g, gt_box) in gt.iter().enumerate() {
            let mut best_anchor = 0usize;
            let mut best_iou = -1f32;

            for i in 0..anchors.len() {
                let anchor = anchors.get(i);
                let iou = gt_box.iou(&anchor)?;

                if iou >= self.iou_threshold && iou > matched_iou[i] {
                    matched_iou[i] = iou;
                    matches[i] = g as isize;
                }
                if iou > best_iou {
                    best_iou = iou;
                    best_anchor = i;
                }
            }

            if !anchors.is_empty() {
                forced.push((best_anchor, g as isize));
            }
        }

        // Best-anchor overrides happen after the threshold pass so a ground
        // truth claim cannot be stolen by a lower-scoring neighbour.
        for (anchor, g) in forced {
            matches[anchor] = g;
        }

        Ok(matches)
    }

    /// Runs the matcher and encodes regression targets for every matched
    /// anchor. Background rows stay zero.
    pub fn encode_targets(
        &self,
        gt: &[SsdBox],
        anchors: &AnchorSet,
        coder: &BoxCoder,
    ) -> Result<(Array2<f32>, Vec<isize>)> {
        let matches = self.match_anchors(gt, anchors)?;
        let mut targets = Array2::<f32>::zeros((anchors.len(), 4));

        for (i, m) in matches.iter().enumerate() {
            if *m < 0 {
                continue;
            }
            let anchor = anchors.get(i);
            let offsets = coder.encode(&gt[*m as usize], &anchor);
            for (c, v) in offsets.iter().enumerate() {
                targets[[i, c]] = *v;
            }
        }

        Ok((targets, matches))
    }
}
