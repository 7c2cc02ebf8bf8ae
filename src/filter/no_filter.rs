//! Filter that keeps the last observation and never predicts motion.

use nalgebra::DMatrix;

use super::Filter;

#[derive(Clone, Debug)]
pub struct NoFilter {
    state: DMatrix<f64>,
}

impl NoFilter {
    pub fn new(initial: &DMatrix<f64>) -> Self {
        Self {
            state: initial.clone(),
        }
    }
}

impl Filter for NoFilter {
    fn predict(&mut self) {}

    fn update(&mut self, measurement: &DMatrix<f64>) {
        debug_assert_eq!(
            measurement.shape(),
            self.state.shape(),
            "measurement shape must match the filter state"
        );
        self.state.copy_from(measurement);
    }

    fn get_state(&self) -> DMatrix<f64> {
        self.state.clone()
    }
}
