//! Per-frame camera displacement and position compensation.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use super::transformations::{CoordinateTransformation, TranslationTransformation};
use crate::track::Tracks;
use crate::{Error, Result};

/// Camera displacement `(dx, dy)` between each frame and the previous one.
/// Frame 0 is always `(0, 0)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraMovement {
    movements: Vec<Vector2<f64>>,
}

impl CameraMovement {
    /// Build from per-frame displacements. The first entry is forced to zero.
    pub fn new(mut movements: Vec<Vector2<f64>>) -> Self {
        if let Some(first) = movements.first_mut() {
            *first = Vector2::zeros();
        }
        Self { movements }
    }

    /// A camera that never moves.
    pub fn still(num_frames: usize) -> Self {
        Self::new(vec![Vector2::zeros(); num_frames])
    }

    pub fn len(&self) -> usize {
        self.movements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }

    pub fn movements(&self) -> &[Vector2<f64>] {
        &self.movements
    }

    /// Running sum of displacements up to and including each frame.
    pub fn cumulative(&self) -> Vec<Vector2<f64>> {
        self.movements
            .iter()
            .scan(Vector2::zeros(), |total, m| {
                *total += m;
                Some(*total)
            })
            .collect()
    }

    /// Translation from frame `t` to frame-0 coordinates, one per frame.
    pub fn transformations(&self) -> Vec<TranslationTransformation> {
        self.cumulative().into_iter().map(TranslationTransformation::new).collect()
    }

    /// Set `position_adjusted` of every record: its position minus the
    /// cumulative displacement up to its frame.
    pub fn adjust_positions(&self, tracks: &mut Tracks) -> Result<()> {
        if tracks.num_frames() != self.len() {
            return Err(Error::FrameCount {
                expected: self.len(),
                got: tracks.num_frames(),
            });
        }

        for (t, transform) in self.transformations().iter().enumerate() {
            for record in tracks.frame_records_mut(t) {
                record.position_adjusted = record.position.map(|p| transform.point_rel_to_abs(&p));
            }
        }
        Ok(())
    }
}
