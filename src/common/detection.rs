use serde::{Deserialize, Serialize};

use crate::common::SsdBox;
use crate::suppression::Nms;

/// A single scored detection. Produced by decoding and suppression,
/// consumed by the caller, never persisted by this crate.
#[derive(Default, Debug, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SsdDetection {
    pub bbox: SsdBox,
    pub score: f32,
    pub class_id: usize,
    pub label: Option<String>,
}

impl Nms for SsdDetection {
    /// Computes the intersection over union (IoU) between this detection
    /// and another. Degenerate pairs count as non-overlapping.
    fn iou(&self, other: &Self) -> f32 {
        let union = self.bbox.union(&other.bbox);
        if union <= 0. {
            return 0.;
        }
        self.bbox.intersect(&other.bbox) / union
    }

    /// Returns the confidence score of the detection.
    fn confidence(&self) -> f32 {
        self.score
    }
}

impl SsdDetection {
    pub fn new(bbox: SsdBox, score: f32, class_id: usize) -> Self {
        Self {
            bbox,
            score,
            class_id,
            label: None,
        }
    }

    /// Sets the bounding box of the detection.
    pub fn with_bbox(mut self, bbox: SsdBox) -> Self {
        self.bbox = bbox;
        self
    }

    /// Sets the confidence score of the detection.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    /// Sets the class ID of the detection.
    pub fn with_class_id(mut self, class_id: usize) -> Self {
        self.class_id = class_id;
        self
    }

    /// Sets the optional human-readable label of the detection.
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn get_label(&self) -> String {
        self.label.clone().unwrap_or("Unknown".to_string())
    }
}

/// Drops detections whose box is narrower or shorter than `min_size`,
/// preserving the order of the survivors.
pub fn remove_small_boxes(detections: &mut Vec<SsdDetection>, min_size: f32) {
    detections.retain(|d| d.bbox.width() >= min_size && d.bbox.height() >= min_size);
}
