//! Camera motion estimation from sparse optical flow.

use nalgebra::{DMatrix, Point2, Vector2};
use opencv::{core::Mat, prelude::*};
use tracing::{debug, info};

use super::config::CameraMotionConfig;
use super::features::{good_features_to_track, track_points, CornerParams, FlowParams};
use super::movement::CameraMovement;
use super::transformations::TranslationTransformationGetter;
use crate::{Error, Result};

fn corner_params(config: &CameraMotionConfig) -> CornerParams {
    CornerParams {
        max_corners: config.max_corners,
        quality_level: config.quality_level,
        min_distance: config.min_corner_distance,
        block_size: config.block_size,
        column_bands: config.column_bands.clone(),
    }
}

fn flow_params(config: &CameraMotionConfig) -> FlowParams {
    FlowParams {
        window_size: config.window_size,
        max_level: config.pyramid_levels,
        max_iterations: config.max_iterations,
        epsilon: config.epsilon,
        min_eigen_threshold: config.min_eigen_threshold,
    }
}

fn frame_size(frame: &Mat) -> (u32, u32) {
    (frame.cols().max(0) as u32, frame.rows().max(0) as u32)
}

/// Estimates per-frame camera displacement from consecutive frame pairs.
///
/// Corners detected in the margin bands are tracked into the next frame; the
/// dominant flow vector of the tracked corners is the frame's displacement.
/// Corners are re-detected on the current frame whenever motion was
/// registered or too few survived tracking.
#[derive(Debug, Clone)]
pub struct MotionEstimator {
    config: CameraMotionConfig,
    getter: TranslationTransformationGetter,
}

impl MotionEstimator {
    pub fn new(config: CameraMotionConfig) -> Result<Self> {
        config.validate()?;
        let getter = TranslationTransformationGetter::new(config.bin_size, config.min_motion);
        Ok(Self { config, getter })
    }

    pub fn config(&self) -> &CameraMotionConfig {
        &self.config
    }

    /// One displacement per grayscale frame; frame 0 is `(0, 0)`.
    pub fn estimate(&self, frames: &[Mat]) -> Result<CameraMovement> {
        let Some(first) = frames.first() else {
            return Ok(CameraMovement::default());
        };
        let expected = frame_size(first);
        for (index, frame) in frames.iter().enumerate() {
            let got = frame_size(frame);
            if got != expected {
                return Err(Error::FrameSize { index, expected, got });
            }
        }

        let corner_params = corner_params(&self.config);
        let flow_params = flow_params(&self.config);

        let mut movements = vec![Vector2::zeros(); frames.len()];
        let mut features = good_features_to_track(first, &corner_params)?;
        debug!(count = features.len(), "initial camera features");

        for (t, pair) in frames.windows(2).enumerate() {
            let t = t + 1;
            let tracked = track_points(&pair[0], &pair[1], &features, &flow_params)?;

            let pairs: Vec<(Point2<f64>, Point2<f64>)> = features
                .iter()
                .zip(tracked)
                .filter_map(|(old, new)| new.map(|new| (*old, new)))
                .collect();

            let movement = self.dominant_flow(&pairs);
            movements[t] = movement;

            if movement != Vector2::zeros() || pairs.len() < self.config.min_features {
                features = good_features_to_track(&pair[1], &corner_params)?;
            }
            debug!(frame = t, dx = movement.x, dy = movement.y, tracked = pairs.len(), "camera movement");
        }

        let moving = movements.iter().filter(|m| **m != Vector2::zeros()).count();
        info!(frames = frames.len(), moving, "estimated camera movement");
        Ok(CameraMovement::new(movements))
    }

    fn dominant_flow(&self, pairs: &[(Point2<f64>, Point2<f64>)]) -> Vector2<f64> {
        let prev = DMatrix::from_fn(pairs.len(), 2, |i, j| pairs[i].0[j]);
        let curr = DMatrix::from_fn(pairs.len(), 2, |i, j| pairs[i].1[j]);
        self.getter
            .call(&curr, &prev)
            .map(|transform| transform.movement_vector)
            .unwrap_or_else(Vector2::zeros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::to_gray;
    use approx::assert_relative_eq;
    use image::{Rgb, RgbImage};

    fn texture(x: f32, y: f32) -> f32 {
        128.0 + 50.0 * (x / 5.0).sin() * (y / 6.0).cos() + 30.0 * ((x + 2.0 * y) / 9.0).sin()
    }

    fn gray_from_fn(width: u32, height: u32, f: impl Fn(f32, f32) -> f32) -> Mat {
        let image = RgbImage::from_fn(width, height, |x, y| {
            let v = f(x as f32, y as f32).round().clamp(0.0, 255.0) as u8;
            Rgb([v, v, v])
        });
        to_gray(&image).unwrap()
    }

    /// Background panning by `shift` pixels per frame.
    fn panning_frames(count: usize, shift: f32) -> Vec<Mat> {
        (0..count)
            .map(|t| gray_from_fn(160, 100, |x, y| texture(x - shift * t as f32, y)))
            .collect()
    }

    fn test_config(min_motion: f64) -> CameraMotionConfig {
        CameraMotionConfig {
            max_corners: 40,
            quality_level: 0.1,
            column_bands: vec![(10, 60), (100, 150)],
            pyramid_levels: 1,
            max_iterations: 20,
            epsilon: 0.01,
            min_motion,
            ..CameraMotionConfig::default()
        }
    }

    #[test]
    fn test_recovers_constant_pan() {
        let estimator = MotionEstimator::new(test_config(1.0)).unwrap();
        let movement = estimator.estimate(&panning_frames(4, 3.0)).unwrap();

        assert_eq!(movement.len(), 4);
        assert_eq!(movement.movements()[0], Vector2::zeros());
        for m in &movement.movements()[1..] {
            assert_relative_eq!(m.x, 3.0, epsilon = 0.3);
            assert_relative_eq!(m.y, 0.0, epsilon = 0.3);
        }
        assert_relative_eq!(movement.cumulative()[3].x, 9.0, epsilon = 0.9);
    }

    #[test]
    fn test_motion_below_threshold_is_zero() {
        let estimator = MotionEstimator::new(test_config(5.0)).unwrap();
        let movement = estimator.estimate(&panning_frames(3, 3.0)).unwrap();

        assert!(movement.movements().iter().all(|m| *m == Vector2::zeros()));
    }

    #[test]
    fn test_static_camera() {
        let estimator = MotionEstimator::new(test_config(1.0)).unwrap();
        let movement = estimator.estimate(&panning_frames(3, 0.0)).unwrap();

        assert!(movement.movements().iter().all(|m| m.norm() < 1e-6));
    }

    #[test]
    fn test_featureless_frames_are_still() {
        let estimator = MotionEstimator::new(test_config(1.0)).unwrap();
        let frames: Vec<Mat> = (0..3).map(|_| gray_from_fn(160, 100, |_, _| 90.0)).collect();

        let movement = estimator.estimate(&frames).unwrap();
        assert_eq!(movement.movements(), &[Vector2::zeros(); 3]);
    }

    #[test]
    fn test_empty_and_mismatched_input() {
        let estimator = MotionEstimator::new(CameraMotionConfig::default()).unwrap();
        assert!(estimator.estimate(&[]).unwrap().is_empty());

        let frames = vec![gray_from_fn(10, 10, |_, _| 0.0), gray_from_fn(12, 10, |_, _| 0.0)];
        assert!(matches!(
            estimator.estimate(&frames),
            Err(Error::FrameSize { index: 1, expected: (10, 10), got: (12, 10) })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CameraMotionConfig {
            column_bands: vec![(50, 10)],
            ..CameraMotionConfig::default()
        };
        assert!(MotionEstimator::new(config).is_err());
    }
}
