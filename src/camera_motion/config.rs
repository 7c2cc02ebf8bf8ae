//! Camera motion estimator settings.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration of the camera motion estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraMotionConfig {
    /// Maximum number of corners tracked per frame.
    pub max_corners: usize,
    /// Corner quality relative to the strongest corner of the frame.
    pub quality_level: f64,
    /// Minimum pixel distance between corners.
    pub min_corner_distance: f64,
    /// Structure tensor window side, in pixels.
    pub block_size: usize,
    /// Column ranges `[start, end)` searched for corners. These image
    /// margins usually show static background such as stands and banners.
    pub column_bands: Vec<(usize, usize)>,
    /// Lucas-Kanade integration window side, in pixels.
    pub window_size: usize,
    pub pyramid_levels: usize,
    pub max_iterations: usize,
    pub epsilon: f64,
    pub min_eigen_threshold: f64,
    /// Flow bucket size used to find the dominant displacement.
    pub bin_size: f64,
    /// Displacements shorter than this (pixels) count as no motion.
    pub min_motion: f64,
    /// Corners are re-detected when fewer than this many were tracked.
    pub min_features: usize,
}

impl Default for CameraMotionConfig {
    fn default() -> Self {
        Self {
            max_corners: 100,
            quality_level: 0.3,
            min_corner_distance: 3.0,
            block_size: 7,
            column_bands: vec![(0, 20), (900, 1050)],
            window_size: 15,
            pyramid_levels: 2,
            max_iterations: 10,
            epsilon: 0.03,
            min_eigen_threshold: 1e-4,
            bin_size: 1.0,
            min_motion: 5.0,
            min_features: 4,
        }
    }
}

impl CameraMotionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_corners == 0 {
            return Err(Error::InvalidConfig("max_corners must be positive".to_string()));
        }
        if !(self.quality_level > 0.0 && self.quality_level <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "quality_level must be in (0, 1], got {}",
                self.quality_level
            )));
        }
        if self.block_size < 3 || self.window_size < 3 {
            return Err(Error::InvalidConfig(
                "block_size and window_size must be at least 3".to_string(),
            ));
        }
        if !(self.bin_size > 0.0) {
            return Err(Error::InvalidConfig("bin_size must be positive".to_string()));
        }
        if !(self.min_motion >= 0.0) {
            return Err(Error::InvalidConfig("min_motion must be non-negative".to_string()));
        }
        if self.column_bands.iter().any(|(start, end)| start >= end) {
            return Err(Error::InvalidConfig(
                "column bands must satisfy start < end".to_string(),
            ));
        }
        Ok(())
    }
}
