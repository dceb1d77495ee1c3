//! Anchor-relative box regression transform.
//!
//! Targets are the standard log-space parameterization:
//!
//! ```text
//! dx = w1 * (g_cx - a_cx) / a_w      dw = w3 * ln(g_w / a_w)
//! dy = w2 * (g_cy - a_cy) / a_h      dh = w4 * ln(g_h / a_h)
//! ```
//!
//! `decode` is the exact inverse, so `decode(encode(b, a), a)` reproduces
//! `b` within floating point tolerance for any well-formed `b` and `a`.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::anchors::AnchorSet;
use crate::common::SsdBox;
use crate::errors::DetectError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxCoder {
    /// Per-component scaling `(w1, w2, w3, w4)` applied to the offsets.
    pub weights: [f32; 4],

    /// Bound on `dw`/`dh` before exponentiation.
    pub clamp: f32,
}

impl Default for BoxCoder {
    fn default() -> Self {
        Self {
            weights: [1., 1., 1., 1.],
            clamp: (1000f32 / 16.).ln(),
        }
    }
}

/// Offsets coming back from a regression head are not trusted: a divergent
/// network can emit NaN or infinities, and a NaN survives `clamp`. Mapping
/// non-finite values to zero keeps every decoded box finite so suppression
/// stays well-defined downstream. This is a documented robustness choice,
/// not silent data loss.
fn sanitize(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.
    }
}

impl BoxCoder {
    pub fn new(weights: [f32; 4]) -> Self {
        Self {
            weights,
            ..Default::default()
        }
    }

    /// The weights SSD-family models are trained with.
    pub fn ssd() -> Self {
        Self::new([10., 10., 5., 5.])
    }

    pub fn with_clamp(mut self, clamp: f32) -> Self {
        self.clamp = clamp;
        self
    }

    /// Encodes a ground-truth box as regression targets relative to an
    /// anchor. Both boxes must have positive dimensions.
    pub fn encode(&self, gt: &SsdBox, anchor: &SsdBox) -> [f32; 4] {
        let (gcx, gcy, gw, gh) = gt.cxcywh();
        let (acx, acy, aw, ah) = anchor.cxcywh();
        let [w1, w2, w3, w4] = self.weights;

        [
            w1 * (gcx - acx) / aw,
            w2 * (gcy - acy) / ah,
            w3 * (gw / aw).ln(),
            w4 * (gh / ah).ln(),
        ]
    }

    /// Decodes regression offsets against an anchor into an absolute box.
    /// Non-finite offsets are zeroed and the size components are clamped
    /// before exponentiation; see `sanitize`.
    pub fn decode(&self, offsets: [f32; 4], anchor: &SsdBox) -> SsdBox {
        let (acx, acy, aw, ah) = anchor.cxcywh();
        let [w1, w2, w3, w4] = self.weights;

        let dx = sanitize(offsets[0]) / w1;
        let dy = sanitize(offsets[1]) / w2;
        let dw = (sanitize(offsets[2]) / w3).clamp(-self.clamp, self.clamp);
        let dh = (sanitize(offsets[3]) / w4).clamp(-self.clamp, self.clamp);

        SsdBox::default().with_cxcy_wh(
            dx * aw + acx,
            dy * ah + acy,
            dw.exp() * aw,
            dh.exp() * ah,
        )
    }

    /// Decodes a full `[N, 4]` offset array against the anchor set,
    /// returning corner-form boxes row-aligned with the anchors.
    pub fn decode_batch(&self, offsets: ArrayView2<f32>, anchors: &AnchorSet) -> Result<Array2<f32>> {
        if offsets.nrows() != anchors.len() || offsets.ncols() != 4 {
            return Err(DetectError::CandidateShape(format!(
                "{}x{} offsets against {} anchors",
                offsets.nrows(),
                offsets.ncols(),
                anchors.len()
            )));
        }

        let mut decoded = Array2::<f32>::zeros((anchors.len(), 4));
        for (i, row) in offsets.outer_iter().enumerate() {
            let anchor = anchors.get(i);
            let bbox = self.decode([row[0], row[1], row[2], row[3]], &anchor);
            decoded[[i, 0]] = bbox.x1;
            decoded[[i, 1]] = bbox.y1;
            decoded[[i, 2]] = bbox.x2;
            decoded[[i, 3]] = bbox.y2;
        }
        Ok(decoded)
    }
}
