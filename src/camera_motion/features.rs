//! Corner detection (Shi-Tomasi) and pyramidal Lucas-Kanade point tracking,
//! both through OpenCV.

use nalgebra::Point2;
use opencv::{
    core::{self, Mat, Point2f, Scalar, Size, TermCriteria, Vector},
    imgproc,
    prelude::*,
    video,
};

use crate::Result;

/// Parameters of the Shi-Tomasi corner detector.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerParams {
    pub max_corners: usize,
    /// Fraction of the strongest response a corner must reach.
    pub quality_level: f64,
    pub min_distance: f64,
    /// Side of the square window summing the structure tensor.
    pub block_size: usize,
    /// Column ranges `[start, end)` where corners may be detected.
    pub column_bands: Vec<(usize, usize)>,
}

/// `CV_8UC1` mask that is 255 inside the column bands and 0 elsewhere.
/// Band ends past the right border are clipped.
pub fn band_mask(width: i32, height: i32, bands: &[(usize, usize)]) -> Result<Mat> {
    let mut mask = Mat::new_rows_cols_with_default(height, width, core::CV_8UC1, Scalar::all(0.0))?;
    let width = width.max(0) as usize;
    if width == 0 {
        return Ok(mask);
    }

    let data = mask.data_bytes_mut()?;
    for row in data.chunks_mut(width) {
        for &(start, end) in bands {
            let end = end.min(width);
            if start < end {
                row[start..end].fill(255);
            }
        }
    }
    Ok(mask)
}

/// Detect up to `max_corners` corners of a grayscale frame inside the
/// column bands, strongest first.
pub fn good_features_to_track(gray: &Mat, params: &CornerParams) -> Result<Vec<Point2<f64>>> {
    let mask = band_mask(gray.cols(), gray.rows(), &params.column_bands)?;
    let mut corners = Vector::<Point2f>::new();
    imgproc::good_features_to_track(
        gray,
        &mut corners,
        params.max_corners as i32,
        params.quality_level,
        params.min_distance,
        &mask,
        params.block_size as i32,
        false,
        0.04,
    )?;
    Ok(corners.iter().map(|c| Point2::new(c.x as f64, c.y as f64)).collect())
}

/// Parameters of the pyramidal Lucas-Kanade tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowParams {
    /// Side of the square integration window.
    pub window_size: usize,
    /// Number of pyramid levels above the full-resolution image.
    pub max_level: usize,
    pub max_iterations: usize,
    /// Stop iterating once the update is smaller than this, in pixels.
    pub epsilon: f64,
    /// Minimum eigenvalue of the window's gradient matrix, per pixel.
    pub min_eigen_threshold: f64,
}

/// Track `points` from `prev` into `next`. `None` marks a point whose
/// window was too flat or that left the image.
pub fn track_points(
    prev: &Mat,
    next: &Mat,
    points: &[Point2<f64>],
    params: &FlowParams,
) -> Result<Vec<Option<Point2<f64>>>> {
    if points.is_empty() {
        return Ok(Vec::new());
    }

    let prev_pts: Vector<Point2f> = points.iter().map(|p| Point2f::new(p.x as f32, p.y as f32)).collect();
    let mut next_pts = Vector::<Point2f>::new();
    let mut status = Vector::<u8>::new();
    let mut err = Vector::<f32>::new();

    let window = params.window_size as i32;
    let criteria = TermCriteria::new(
        core::TermCriteria_COUNT + core::TermCriteria_EPS,
        params.max_iterations as i32,
        params.epsilon,
    )?;
    video::calc_optical_flow_pyr_lk(
        prev,
        next,
        &prev_pts,
        &mut next_pts,
        &mut status,
        &mut err,
        Size::new(window, window),
        params.max_level as i32,
        criteria,
        video::OPTFLOW_LK_GET_MIN_EIGENVALS,
        params.min_eigen_threshold,
    )?;

    Ok(status
        .iter()
        .zip(next_pts.iter())
        .map(|(found, p)| (found != 0).then(|| Point2::new(p.x as f64, p.y as f64)))
        .collect())
}
