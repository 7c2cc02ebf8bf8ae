//! Motion filters for the bounding-box corners of tracked objects.
//!
//! - `KalmanFilter` - constant-velocity Kalman filter, one independent
//!   position/velocity state per coordinate
//! - `NoFilter` - keeps the last observation, predicts no motion

mod kalman;
mod no_filter;

pub use kalman::KalmanFilter;
pub use no_filter::NoFilter;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Common interface of the motion filters.
pub trait Filter: Send + Sync {
    /// Advance the state by one frame.
    fn predict(&mut self);

    /// Correct the state with an observation (n_points x n_dims).
    fn update(&mut self, measurement: &DMatrix<f64>);

    /// Current position estimate (n_points x n_dims).
    fn get_state(&self) -> DMatrix<f64>;
}

/// Which filter the tracker builds for new objects, with its noise parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    Kalman {
        /// Measurement noise variance.
        r: f64,
        /// Process noise variance.
        q: f64,
        /// Initial position variance.
        pos_variance: f64,
        /// Initial velocity variance.
        vel_variance: f64,
    },
    None,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig::Kalman {
            r: 4.0,
            q: 0.1,
            pos_variance: 10.0,
            vel_variance: 1.0,
        }
    }
}

impl FilterConfig {
    /// Build a filter initialized at the given points with zero velocity.
    pub fn create(&self, initial: &DMatrix<f64>) -> FilterEnum {
        match *self {
            FilterConfig::Kalman {
                r,
                q,
                pos_variance,
                vel_variance,
            } => FilterEnum::Kalman(KalmanFilter::new(initial, r, q, pos_variance, vel_variance)),
            FilterConfig::None => FilterEnum::None(NoFilter::new(initial)),
        }
    }
}

/// Enum dispatch over the available filters.
#[derive(Clone, Debug)]
pub enum FilterEnum {
    Kalman(KalmanFilter),
    None(NoFilter),
}

impl Filter for FilterEnum {
    #[inline]
    fn predict(&mut self) {
        match self {
            FilterEnum::Kalman(f) => f.predict(),
            FilterEnum::None(f) => f.predict(),
        }
    }

    #[inline]
    fn update(&mut self, measurement: &DMatrix<f64>) {
        match self {
            FilterEnum::Kalman(f) => f.update(measurement),
            FilterEnum::None(f) => f.update(measurement),
        }
    }

    #[inline]
    fn get_state(&self) -> DMatrix<f64> {
        match self {
            FilterEnum::Kalman(f) => f.get_state(),
            FilterEnum::None(f) => f.get_state(),
        }
    }
}
