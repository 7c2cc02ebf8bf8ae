//! Bounding-box geometry shared by every stage.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned pixel bounding box `(x1, y1)` top-left, `(x2, y2)` bottom-right.
///
/// Serialized as a plain `[x1, y1, x2, y2]` array, the detector's own format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Centre of the box. Used as the position of the ball.
    pub fn center(&self) -> Point2<f64> {
        Point2::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Bottom-centre of the box. Used as the ground contact point of people.
    pub fn foot_position(&self) -> Point2<f64> {
        Point2::new((self.x1 + self.x2) / 2.0, self.y2)
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// True when every coordinate is finite and the corners are ordered.
    pub fn is_well_formed(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite()) && self.x2 >= self.x1 && self.y2 >= self.y1
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Intersection over union with another box, 0 when disjoint.
    pub fn iou(&self, other: &BBox) -> f64 {
        let inter_w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let inter_h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter_area = inter_w * inter_h;
        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }

    /// Clamp the box to an image of the given size and round outward to whole
    /// pixels. Returns `None` when nothing of the box remains inside the image.
    pub fn pixel_bounds(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        if !self.is_well_formed() {
            return None;
        }
        let x1 = clamp(self.x1.floor(), 0.0, width as f64) as u32;
        let y1 = clamp(self.y1.floor(), 0.0, height as f64) as u32;
        let x2 = clamp(self.x2.ceil(), 0.0, width as f64) as u32;
        let y2 = clamp(self.y2.ceil(), 0.0, height as f64) as u32;

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

impl From<[f64; 4]> for BBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        b.as_array()
    }
}

/// Euclidean distance between two points.
pub fn measure_distance(p1: &Point2<f64>, p2: &Point2<f64>) -> f64 {
    (p1 - p2).norm()
}

/// Clamp a value to a range.
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}
