use serde::{Deserialize, Serialize};

use crate::errors::DetectError;
use crate::Result;

/// Coordinate layouts a raw box can arrive in.
///
/// Only the first three are convertible; the two hybrid layouts show up in
/// some exported model outputs and are carried for labelling purposes, but
/// `convert` rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoxFormat {
    /// (x_min, y_min, x_max, y_max)
    Xyxy,

    /// (x_min, y_min, width, height)
    Xywh,

    /// (center_x, center_y, width, height)
    Cxcywh,

    /// (center_x, center_y, x_max, y_max)
    Cxcyxy,

    /// (x_min, y_min, center_x, center_y)
    XyCxcy,
}

/// Lossless conversion between box coordinate layouts.
///
/// Round-tripping through any supported layout reproduces the input within
/// floating point tolerance.
pub fn convert(coords: [f32; 4], from: BoxFormat, to: BoxFormat) -> Result<[f32; 4]> {
    let [a, b, c, d] = coords;
    let (x1, y1, x2, y2) = match from {
        BoxFormat::Xyxy => (a, b, c, d),
        BoxFormat::Xywh => (a, b, a + c, b + d),
        BoxFormat::Cxcywh => (a - c / 2., b - d / 2., a + c / 2., b + d / 2.),
        BoxFormat::Cxcyxy | BoxFormat::XyCxcy => {
            return Err(DetectError::UnsupportedFormat { from, to })
        }
    };

    match to {
        BoxFormat::Xyxy => Ok([x1, y1, x2, y2]),
        BoxFormat::Xywh => Ok([x1, y1, x2 - x1, y2 - y1]),
        BoxFormat::Cxcywh => Ok([(x1 + x2) / 2., (y1 + y2) / 2., x2 - x1, y2 - y1]),
        BoxFormat::Cxcyxy | BoxFormat::XyCxcy => {
            Err(DetectError::UnsupportedFormat { from, to })
        }
    }
}

/// Axis-aligned box stored in corner form.
///
/// A well-formed box satisfies `x1 <= x2` and `y1 <= y2`. Constructors do
/// not enforce this; `iou` and friends reject malformed boxes instead, so
/// callers that ingest untrusted coordinates validate or clip first.
#[derive(Default, Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SsdBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl SsdBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Builds a box from raw coordinates in the given layout.
    pub fn from_coords(coords: [f32; 4], format: BoxFormat) -> Result<Self> {
        let [x1, y1, x2, y2] = convert(coords, format, BoxFormat::Xyxy)?;
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Returns the coordinates in the given layout.
    pub fn to_coords(&self, format: BoxFormat) -> Result<[f32; 4]> {
        convert([self.x1, self.y1, self.x2, self.y2], BoxFormat::Xyxy, format)
    }

    /// Returns the width of the bounding box.
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Returns the height of the bounding box.
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Returns the center x-coordinate of the bounding box.
    pub fn cx(&self) -> f32 {
        (self.x1 + self.x2) / 2.
    }

    /// Returns the center y-coordinate of the bounding box.
    pub fn cy(&self) -> f32 {
        (self.y1 + self.y2) / 2.
    }

    /// Returns the bounding box coordinates as `(x1, y1, x2, y2)`.
    pub fn xyxy(&self) -> (f32, f32, f32, f32) {
        (self.x1, self.y1, self.x2, self.y2)
    }

    /// Returns the center coordinates and size as `(cx, cy, w, h)`.
    pub fn cxcywh(&self) -> (f32, f32, f32, f32) {
        (self.cx(), self.cy(), self.width(), self.height())
    }

    /// Computes the area of the bounding box. Zero for degenerate boxes.
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Computes the intersection area between this bounding box and another.
    pub fn intersect(&self, other: &SsdBox) -> f32 {
        let left = self.x1.max(other.x1);
        let right = self.x2.min(other.x2);
        let top = self.y1.max(other.y1);
        let bottom = self.y2.min(other.y2);
        (right - left).max(0.) * (bottom - top).max(0.)
    }

    /// Computes the union area between this bounding box and another.
    pub fn union(&self, other: &SsdBox) -> f32 {
        self.area() + other.area() - self.intersect(other)
    }

    /// Intersection over union, in `[0, 1]`. Zero when the boxes are
    /// disjoint. Boxes with negative dimensions are rejected.
    pub fn iou(&self, other: &SsdBox) -> Result<f32> {
        self.validate()?;
        other.validate()?;
        let union = self.union(other);
        if union <= 0. {
            return Ok(0.);
        }
        Ok(self.intersect(other) / union)
    }

    /// Generalized intersection over union, in `[-1, 1]`. Penalizes
    /// disjoint boxes by the empty share of their smallest enclosing box.
    pub fn generalized_iou(&self, other: &SsdBox) -> Result<f32> {
        let iou = self.iou(other)?;
        let hull_w = self.x2.max(other.x2) - self.x1.min(other.x1);
        let hull_h = self.y2.max(other.y2) - self.y1.min(other.y1);
        let hull = hull_w * hull_h;
        if hull <= 0. {
            return Ok(iou);
        }
        let union = self.union(other);
        Ok(iou - (hull - union) / hull)
    }

    /// Checks if this bounding box completely contains `other`.
    pub fn contains(&self, other: &SsdBox) -> bool {
        self.x1 <= other.x1 && self.x2 >= other.x2 && self.y1 <= other.y1 && self.y2 >= other.y2
    }

    /// Clamps the coordinates into `[0, width] x [0, height]`.
    pub fn clip_to_image(&self, width: f32, height: f32) -> SsdBox {
        SsdBox {
            x1: self.x1.clamp(0., width),
            y1: self.y1.clamp(0., height),
            x2: self.x2.clamp(0., width),
            y2: self.y2.clamp(0., height),
        }
    }

    /// Returns the box with both axes multiplied by the given factors.
    /// Used to map normalized coordinates into pixel space.
    pub fn scaled(&self, sx: f32, sy: f32) -> SsdBox {
        SsdBox {
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            x2: self.x2 * sx,
            y2: self.y2 * sy,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width() >= 0. && self.height() >= 0.
    }

    pub fn validate(&self) -> Result<()> {
        if !self.is_valid() {
            return Err(DetectError::InvalidGeometry {
                width: self.width(),
                height: self.height(),
            });
        }
        Ok(())
    }

    /// Sets the bounding box's coordinates using `(x1, y1, x2, y2)`.
    ///
    /// # Arguments
    ///
    /// * `x1` - The x-coordinate of the top-left corner.
    /// * `y1` - The y-coordinate of the top-left corner.
    /// * `x2` - The x-coordinate of the bottom-right corner.
    /// * `y2` - The y-coordinate of the bottom-right corner.
    ///
    /// # Returns
    ///
    /// An `SsdBox` instance with updated coordinates.
    pub fn with_x1y1_x2y2(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
        self
    }

    /// Sets the bounding box's coordinates and dimensions using `(x, y, w, h)`.
    pub fn with_x1y1_wh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.x1 = x;
        self.y1 = y;
        self.x2 = x + w;
        self.y2 = y + h;
        self
    }

    /// Sets the bounding box's coordinates and dimensions using `(cx, cy, w, h)`.
    pub fn with_cxcy_wh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.x1 = cx - w / 2.0;
        self.y1 = cy - h / 2.0;
        self.x2 = cx + w / 2.0;
        self.y2 = cy + h / 2.0;
        self
    }
}
