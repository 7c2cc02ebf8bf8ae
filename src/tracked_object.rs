//! Objects maintained by the identity tracker between frames.

use std::fmt;

use nalgebra::DMatrix;

use crate::detection::{Detection, ObjectClass};
use crate::filter::{Filter, FilterEnum};
use crate::utils::BBox;

/// A player or referee followed across frames.
///
/// The motion filter tracks the two box corners as a 2x2 point matrix; the
/// box estimate is rebuilt from the filter state after every predict/update.
pub struct TrackedObject {
    /// Permanent identity (None while initializing). Starts at 1.
    pub id: Option<u32>,

    /// Normalized class, fixed for the lifetime of the object.
    pub class: ObjectClass,

    /// Remaining frames before the object is considered dead.
    pub hit_counter: i32,

    /// Whether the object is still in its initialization phase.
    pub is_initializing: bool,

    /// Predicted box for the current frame.
    pub estimate: BBox,

    /// Most recent matched detection.
    pub last_detection: Detection,

    /// True when a detection was matched to this object in the latest update.
    pub matched_this_frame: bool,

    pub(crate) filter: FilterEnum,
}

impl fmt::Debug for TrackedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedObject")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("hit_counter", &self.hit_counter)
            .field("is_initializing", &self.is_initializing)
            .field("estimate", &self.estimate)
            .field("matched_this_frame", &self.matched_this_frame)
            .field("filter", &"<Filter>")
            .finish()
    }
}

impl TrackedObject {
    /// Create an object from its first detection.
    pub(crate) fn new(detection: &Detection, filter: FilterEnum, hit_counter: i32) -> Self {
        let estimate = bbox_from_points(&filter.get_state()).unwrap_or(detection.bbox);
        Self {
            id: None,
            class: detection.class,
            hit_counter,
            is_initializing: true,
            estimate,
            last_detection: detection.clone(),
            matched_this_frame: true,
            filter,
        }
    }

    /// Advance the motion filter one frame and refresh the estimate.
    pub(crate) fn predict(&mut self) {
        self.filter.predict();
        self.refresh_estimate();
    }

    /// Correct the motion filter with a matched detection.
    pub(crate) fn observe(&mut self, detection: &Detection) {
        self.filter.update(&detection.points());
        self.refresh_estimate();
        self.last_detection = detection.clone();
        self.matched_this_frame = true;
    }

    fn refresh_estimate(&mut self) {
        if let Some(bbox) = bbox_from_points(&self.filter.get_state()) {
            self.estimate = bbox;
        }
    }

    /// Whether the object is reported in the current frame.
    pub fn is_visible(&self) -> bool {
        !self.is_initializing && self.matched_this_frame
    }

    #[cfg(test)]
    pub(crate) fn for_tests(class: ObjectClass, bbox: BBox) -> Self {
        let detection = Detection::new(class, bbox, 1.0).unwrap();
        let filter = crate::filter::FilterConfig::default().create(&detection.points());
        Self::new(&detection, filter, 1)
    }
}

/// Rebuild a box from a 2x2 corner matrix. A filter may briefly invert the
/// corners, so they are reordered.
fn bbox_from_points(points: &DMatrix<f64>) -> Option<BBox> {
    if points.nrows() != 2 || points.ncols() != 2 {
        return None;
    }
    let (xa, ya, xb, yb) = (points[(0, 0)], points[(0, 1)], points[(1, 0)], points[(1, 1)]);
    let bbox = BBox::new(xa.min(xb), ya.min(yb), xa.max(xb), ya.max(yb));
    bbox.is_well_formed().then_some(bbox)
}
