//! Greedy non-maximum suppression.

use crate::common::SsdDetection;

/// The two measurements suppression needs from a candidate. Any scored box
/// type can opt in.
pub trait Nms {
    fn iou(&self, other: &Self) -> f32;
    fn confidence(&self) -> f32;
}

/// Suppresses overlapping candidates in place, keeping at most `max_keep`.
///
/// Candidates are sorted by descending confidence with a stable sort, so
/// equal scores keep their input order; that index order is the one
/// tie-break rule and makes the result deterministic. The highest-scoring
/// remaining candidate is kept and every later candidate overlapping it by
/// more than `iou_threshold` is dropped.
///
/// A threshold at or above 1 suppresses nothing. A threshold at or below 0
/// keeps only the single top-scoring candidate, overlapping or not.
pub fn nms<T: Nms>(boxes: &mut Vec<T>, iou_threshold: f32, max_keep: Option<usize>) {
    boxes.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));

    let cap = max_keep.unwrap_or(usize::MAX);
    let mut kept = 0;
    for index in 0..boxes.len() {
        if kept == cap {
            break;
        }
        let mut drop = false;
        for prev in 0..kept {
            if iou_threshold <= 0.0 || boxes[prev].iou(&boxes[index]) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            boxes.swap(kept, index);
            kept += 1;
        }
    }
    boxes.truncate(kept);
}

/// Class-aware suppression: boxes only ever suppress boxes of the same
/// class, and the surviving list stays globally sorted by descending score
/// under the same stable index tie-break as [`nms`].
pub fn batched_nms(
    detections: &mut Vec<SsdDetection>,
    iou_threshold: f32,
    max_keep: Option<usize>,
) {
    detections.sort_by(|d1, d2| d2.score.total_cmp(&d1.score));

    let cap = max_keep.unwrap_or(usize::MAX);
    let mut kept = 0;
    for index in 0..detections.len() {
        if kept == cap {
            break;
        }
        let mut drop = false;
        for prev in 0..kept {
            if detections[prev].class_id != detections[index].class_id {
                continue;
            }
            if iou_threshold <= 0.0 || Nms::iou(&detections[prev], &detections[index]) > iou_threshold
            {
                drop = true;
                break;
            }
        }
        if !drop {
            detections.swap(kept, index);
            kept += 1;
        }
    }
    detections.truncate(kept);
}
