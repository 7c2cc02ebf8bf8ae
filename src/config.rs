//! Pipeline configuration, loadable from a partial JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::camera_motion::CameraMotionConfig;
use crate::kinematics::KinematicsConfig;
use crate::possession::PossessionConfig;
use crate::projection::ProjectionConfig;
use crate::team::TeamConfig;
use crate::tracker::TrackerConfig;
use crate::{Error, Result};

/// Configuration of every pipeline stage. Sections and fields missing from
/// a JSON file keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tracker: TrackerConfig,
    pub camera_motion: CameraMotionConfig,
    pub projection: ProjectionConfig,
    pub kinematics: KinematicsConfig,
    pub team: TeamConfig,
    pub possession: PossessionConfig,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tracker.validate()?;
        self.camera_motion.validate()?;
        self.kinematics.validate()?;
        self.possession.validate()?;
        Ok(())
    }
}
