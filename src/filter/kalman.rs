//! Constant-velocity Kalman filter with per-coordinate covariance.
//!
//! Every coordinate of every point is an independent `[position, velocity]`
//! state with its own 2x2 covariance.

use nalgebra::{DMatrix, Matrix2, RowVector2, Vector2};

use super::Filter;

fn transition() -> Matrix2<f64> {
    Matrix2::new(1.0, 1.0, 0.0, 1.0)
}

fn observation() -> RowVector2<f64> {
    RowVector2::new(1.0, 0.0)
}

#[derive(Clone, Debug)]
pub struct KalmanFilter {
    /// `[position, velocity]` per coordinate, row-major over (point, dim).
    states: Vec<Vector2<f64>>,
    covariances: Vec<Matrix2<f64>>,
    /// Measurement noise variance.
    r: f64,
    /// Process noise, applied to position and velocity.
    q: Matrix2<f64>,
    n_points: usize,
    n_dims: usize,
}

impl KalmanFilter {
    pub fn new(
        initial: &DMatrix<f64>,
        r: f64,
        q: f64,
        pos_variance: f64,
        vel_variance: f64,
    ) -> Self {
        let n_points = initial.nrows();
        let n_dims = initial.ncols();

        let states = (0..n_points)
            .flat_map(|i| (0..n_dims).map(move |j| (i, j)))
            .map(|(i, j)| Vector2::new(initial[(i, j)], 0.0))
            .collect::<Vec<_>>();
        let covariances = vec![Matrix2::new(pos_variance, 0.0, 0.0, vel_variance); states.len()];

        Self {
            states,
            covariances,
            r,
            q: Matrix2::new(q / 4.0, q / 2.0, q / 2.0, q),
            n_points,
            n_dims,
        }
    }

}

impl Filter for KalmanFilter {
    fn predict(&mut self) {
        let f = transition();
        for (x, p) in self.states.iter_mut().zip(self.covariances.iter_mut()) {
            *x = f * *x;
            *p = f * *p * f.transpose() + self.q;
        }
    }

    fn update(&mut self, measurement: &DMatrix<f64>) {
        debug_assert_eq!(
            measurement.shape(),
            (self.n_points, self.n_dims),
            "measurement shape must match the filter state"
        );

        let h = observation();
        for i in 0..self.n_points {
            for j in 0..self.n_dims {
                let k = i * self.n_dims + j;
                let x = &mut self.states[k];
                let p = &mut self.covariances[k];

                let innovation = measurement[(i, j)] - (h * *x)[0];
                let innovation_variance = p[(0, 0)] + self.r;
                let gain = *p * h.transpose() / innovation_variance;

                *x += gain * innovation;
                *p = (Matrix2::identity() - gain * h) * *p;
            }
        }
    }

    fn get_state(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n_points, self.n_dims, |i, j| self.states[i * self.n_dims + j][0])
    }
}
