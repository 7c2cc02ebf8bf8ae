//! Distance functions for matching detections to tracked objects.

mod functions;

pub use functions::*;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::detection::Detection;
use crate::tracked_object::TrackedObject;

/// Enum dispatch over the built-in distance functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceFunction {
    /// `1 - IoU` of the predicted box and the detection.
    Iou,
    /// Pixel distance between box centres.
    Centroid,
    /// Centre distance over the object's box diagonal.
    NormalizedCentroid,
}

impl DistanceFunction {
    /// Distance between a single detection and object.
    #[inline]
    pub fn distance(&self, detection: &Detection, object: &TrackedObject) -> f64 {
        match self {
            DistanceFunction::Iou => iou(detection, object),
            DistanceFunction::Centroid => centroid(detection, object),
            DistanceFunction::NormalizedCentroid => normalized_centroid(detection, object),
        }
    }

    /// Distance matrix (n_detections x n_objects).
    pub fn get_distances(&self, objects: &[&TrackedObject], candidates: &[&Detection]) -> DMatrix<f64> {
        DMatrix::from_fn(candidates.len(), objects.len(), |i, j| {
            self.distance(candidates[i], objects[j])
        })
    }
}
