//! Windowed speed and cumulative distance from ground positions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detection::ObjectClass;
use crate::track::{FrameRecords, Tracks};
use crate::utils::measure_distance;
use crate::{Error, Result};

const MPS_TO_KMH: f64 = 3.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    /// Frames per second of the source video.
    pub frame_rate: f64,
    /// Frames per speed window.
    pub window: usize,
    /// Classes that receive speed and distance.
    pub classes: Vec<ObjectClass>,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            frame_rate: 24.0,
            window: 5,
            classes: ObjectClass::ALL.to_vec(),
        }
    }
}

impl KinematicsConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.frame_rate > 0.0) || !self.frame_rate.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "frame_rate must be positive, got {}",
                self.frame_rate
            )));
        }
        if self.window == 0 {
            return Err(Error::InvalidConfig("window must be at least 1 frame".to_string()));
        }
        Ok(())
    }
}

/// Speed window boundaries `(start, end)` for a clip of `num_frames` frames.
///
/// Windows start every `window` frames and end `window` frames later, clipped
/// to the last frame; consecutive windows share their boundary frame.
pub fn windows(num_frames: usize, window: usize) -> Vec<(usize, usize)> {
    if num_frames < 2 || window == 0 {
        return Vec::new();
    }
    (0..num_frames)
        .step_by(window)
        .map(|start| (start, (start + window).min(num_frames - 1)))
        .filter(|(start, end)| end > start)
        .collect()
}

/// Computes `speed` (km/h) and cumulative `distance` (m) per identity.
#[derive(Debug, Clone)]
pub struct SpeedAndDistanceEstimator {
    config: KinematicsConfig,
}

impl SpeedAndDistanceEstimator {
    pub fn new(config: KinematicsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Annotate every configured class of `tracks`.
    pub fn compute(&self, tracks: &mut Tracks) {
        for &class in &self.config.classes {
            self.compute_class(tracks.class_mut(class));
            debug!(class = class.as_str(), "computed speed and distance");
        }
    }

    /// Annotate one class. Frames of a window are only annotated when the
    /// identity has a ground position at both window ends.
    pub fn compute_class(&self, frames: &mut [FrameRecords]) {
        let num_frames = frames.len();
        let mut totals: HashMap<u32, f64> = HashMap::new();

        for (start, end) in windows(num_frames, self.config.window) {
            let elapsed = (end - start) as f64 / self.config.frame_rate;
            let last_window = end == num_frames - 1;

            let ids: Vec<u32> = frames[start].keys().copied().collect();
            for id in ids {
                let from = frames[start].get(&id).and_then(|r| r.position_transformed);
                let to = frames[end].get(&id).and_then(|r| r.position_transformed);
                let (Some(from), Some(to)) = (from, to) else {
                    continue;
                };

                let covered = measure_distance(&from, &to);
                let speed = covered / elapsed * MPS_TO_KMH;
                let total = totals.entry(id).or_insert(0.0);
                *total += covered;

                let stop = if last_window { end + 1 } else { end };
                for frame in &mut frames[start..stop] {
                    if let Some(record) = frame.get_mut(&id) {
                        record.speed = Some(speed);
                        record.distance = Some(*total);
                    }
                }
            }
        }
    }
}
