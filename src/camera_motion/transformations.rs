//! Coordinate transformations between the camera frame and a fixed reference.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, Point2, Vector2};
#[cfg(feature = "opencv")]
use nalgebra::Matrix3;
#[cfg(feature = "opencv")]
use opencv::{
    core::{Point2f, Vector},
    imgproc,
    prelude::*,
};

#[cfg(feature = "opencv")]
use crate::{Error, Result};

/// Transform between relative and absolute coordinates.
///
/// Points can be interpreted in 2 references:
/// - Relative: their position on the current frame, (0, 0) is top left
/// - Absolute: their position in a fixed space (the first frame, or the field)
///
/// Points are (n_points x 2) matrices.
pub trait CoordinateTransformation: Send + Sync + std::fmt::Debug {
    /// Transform points from relative (camera frame) to absolute coordinates.
    fn rel_to_abs(&self, points: &DMatrix<f64>) -> DMatrix<f64>;

    /// Transform points from absolute to relative (camera frame) coordinates.
    fn abs_to_rel(&self, points: &DMatrix<f64>) -> DMatrix<f64>;

    /// Convenience wrapper for a single point.
    fn point_rel_to_abs(&self, point: &Point2<f64>) -> Point2<f64> {
        let abs = self.rel_to_abs(&DMatrix::from_row_slice(1, 2, &[point.x, point.y]));
        Point2::new(abs[(0, 0)], abs[(0, 1)])
    }
}

/// Simple 2D translation (camera pan/tilt without rotation or zoom).
///
/// `movement_vector` is the apparent motion of the background in the image,
/// so converting to absolute coordinates subtracts it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslationTransformation {
    pub movement_vector: Vector2<f64>,
}

impl TranslationTransformation {
    pub fn new(movement_vector: Vector2<f64>) -> Self {
        Self { movement_vector }
    }
}

impl CoordinateTransformation for TranslationTransformation {
    fn abs_to_rel(&self, points: &DMatrix<f64>) -> DMatrix<f64> {
        if points.ncols() != 2 {
            return points.clone();
        }

        let mut result = points.clone();
        for i in 0..result.nrows() {
            result[(i, 0)] += self.movement_vector.x;
            result[(i, 1)] += self.movement_vector.y;
        }
        result
    }

    fn rel_to_abs(&self, points: &DMatrix<f64>) -> DMatrix<f64> {
        if points.ncols() != 2 {
            return points.clone();
        }

        let mut result = points.clone();
        for i in 0..result.nrows() {
            result[(i, 0)] -= self.movement_vector.x;
            result[(i, 1)] -= self.movement_vector.y;
        }
        result
    }
}

/// Estimates the translation between two point sets as the mode of their
/// optical flow.
///
/// Flow vectors are bucketed into `bin_size` cells; the most populated cell
/// wins (ties go to the smallest cell) and its members are averaged. A mode
/// shorter than `min_motion` pixels is reported as no motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslationTransformationGetter {
    /// Granularity for flow bucketing before calculating the mode.
    pub bin_size: f64,

    /// Flow magnitude below which the camera is considered still.
    pub min_motion: f64,
}

impl TranslationTransformationGetter {
    pub fn new(bin_size: f64, min_motion: f64) -> Self {
        Self { bin_size, min_motion }
    }

    /// Dominant flow `curr_pts - prev_pts`, or `None` when the point sets are
    /// empty or their shapes disagree.
    pub fn call(&self, curr_pts: &DMatrix<f64>, prev_pts: &DMatrix<f64>) -> Option<TranslationTransformation> {
        let rows = curr_pts.nrows();
        if rows == 0 || rows != prev_pts.nrows() || curr_pts.ncols() != 2 || prev_pts.ncols() != 2 {
            return None;
        }

        let mut bins: BTreeMap<(i64, i64), (usize, Vector2<f64>)> = BTreeMap::new();
        for i in 0..rows {
            let flow = Vector2::new(
                curr_pts[(i, 0)] - prev_pts[(i, 0)],
                curr_pts[(i, 1)] - prev_pts[(i, 1)],
            );
            if !flow.iter().all(|v| v.is_finite()) {
                continue;
            }
            let key = (
                (flow.x / self.bin_size).round() as i64,
                (flow.y / self.bin_size).round() as i64,
            );
            let bin = bins.entry(key).or_insert((0, Vector2::zeros()));
            bin.0 += 1;
            bin.1 += flow;
        }

        let mut best: Option<(usize, Vector2<f64>)> = None;
        for &(count, sum) in bins.values() {
            if best.map_or(true, |(c, _)| count > c) {
                best = Some((count, sum));
            }
        }
        let (count, sum) = best?;

        let mode = sum / count as f64;
        let movement = if mode.norm() < self.min_motion { Vector2::zeros() } else { mode };
        Some(TranslationTransformation::new(movement))
    }
}

/// Full perspective transformation using a 3x3 homography matrix.
///
/// `homography_matrix` maps absolute points to relative ones.
#[cfg(feature = "opencv")]
#[derive(Debug, Clone, PartialEq)]
pub struct HomographyTransformation {
    pub homography_matrix: Matrix3<f64>,
    /// Pre-computed inverse.
    pub inverse_homography_matrix: Matrix3<f64>,
}

#[cfg(feature = "opencv")]
impl HomographyTransformation {
    pub fn new(homography_matrix: Matrix3<f64>) -> Result<Self> {
        let inverse = homography_matrix
            .try_inverse()
            .ok_or_else(|| Error::Calibration("cannot invert homography matrix".to_string()))?;

        Ok(Self {
            homography_matrix,
            inverse_homography_matrix: inverse,
        })
    }

    /// Perspective transform mapping each `abs[i]` onto `rel[i]`.
    pub fn from_correspondences(abs: &[Point2<f64>; 4], rel: &[Point2<f64>; 4]) -> Result<Self> {
        if has_collinear_triple(abs) || has_collinear_triple(rel) {
            return Err(Error::Calibration(
                "three of the four correspondence points are collinear".to_string(),
            ));
        }

        let to_cv = |points: &[Point2<f64>; 4]| -> Vector<Point2f> {
            points.iter().map(|p| Point2f::new(p.x as f32, p.y as f32)).collect()
        };
        let h = imgproc::get_perspective_transform_def(&to_cv(abs), &to_cv(rel))?;

        let mut matrix = Matrix3::zeros();
        for row in 0..3 {
            for col in 0..3 {
                matrix[(row, col)] = *h.at_2d::<f64>(row as i32, col as i32)?;
            }
        }
        Self::new(matrix)
    }

    fn transform_points(&self, points: &DMatrix<f64>, transform_matrix: &Matrix3<f64>) -> DMatrix<f64> {
        if points.ncols() != 2 {
            return points.clone();
        }

        let rows = points.nrows();
        let mut result = DMatrix::zeros(rows, 2);

        for i in 0..rows {
            let x = points[(i, 0)];
            let y = points[(i, 1)];

            // [x', y', w'] = H * [x, y, 1]^T
            let x_prime = transform_matrix[(0, 0)] * x + transform_matrix[(0, 1)] * y + transform_matrix[(0, 2)];
            let y_prime = transform_matrix[(1, 0)] * x + transform_matrix[(1, 1)] * y + transform_matrix[(1, 2)];
            let w_prime = transform_matrix[(2, 0)] * x + transform_matrix[(2, 1)] * y + transform_matrix[(2, 2)];

            let w = if w_prime == 0.0 { 0.0000001 } else { w_prime };
            result[(i, 0)] = x_prime / w;
            result[(i, 1)] = y_prime / w;
        }

        result
    }
}

#[cfg(feature = "opencv")]
fn has_collinear_triple(points: &[Point2<f64>; 4]) -> bool {
    let scale = points
        .iter()
        .flat_map(|p| [p.x.abs(), p.y.abs()])
        .fold(1.0f64, f64::max);
    let tolerance = 1e-9 * scale * scale;

    (0..4).any(|skip| {
        let tri: Vec<&Point2<f64>> = points.iter().enumerate().filter(|(i, _)| *i != skip).map(|(_, p)| p).collect();
        let (ab, ac) = (tri[1] - tri[0], tri[2] - tri[0]);
        (ab.x * ac.y - ab.y * ac.x).abs() <= tolerance
    })
}

#[cfg(feature = "opencv")]
impl CoordinateTransformation for HomographyTransformation {
    fn abs_to_rel(&self, points: &DMatrix<f64>) -> DMatrix<f64> {
        self.transform_points(points, &self.homography_matrix)
    }

    fn rel_to_abs(&self, points: &DMatrix<f64>) -> DMatrix<f64> {
        self.transform_points(points, &self.inverse_homography_matrix)
    }
}
