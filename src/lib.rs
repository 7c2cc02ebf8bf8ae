//! # pitchtrack - Field-sports video analytics
//!
//! Fuses per-frame object detections from a football broadcast into stable
//! identities, camera-compensated ground positions, speed and distance,
//! team affiliation and ball possession.
//!
//! ## Features
//!
//! - Kalman filter-based identity tracking with pluggable distance functions
//! - Camera motion compensation from sparse optical flow (`opencv` feature)
//! - Pixel to metre projection through a calibrated homography (`opencv` feature)
//! - Ball trajectory interpolation
//! - Jersey-colour team classification
//! - Ball possession with carry-forward of the controlling team
//!
//! ## Example
//!
//! ```rust,ignore
//! use pitchtrack_rs::{Pipeline, PipelineConfig, DetectorOutput, load_frames};
//!
//! let frames = load_frames(Path::new("frames/"))?;
//! let detections = DetectorOutput::load(Path::new("detections.json"))?;
//!
//! let mut pipeline = Pipeline::new(PipelineConfig::default())?;
//! let output = pipeline.run(&frames, &detections.frames)?;
//! output.save(Path::new("output.json"))?;
//! ```

// Internal modules
pub(crate) mod internal;

// Public modules
pub mod filter;
pub mod distances;
pub mod tracker;
pub mod detection;
pub mod tracked_object;
pub mod matching;
pub mod camera_motion;
pub mod frame;
pub mod track;
pub mod projection;
pub mod interpolation;
pub mod kinematics;
pub mod team;
pub mod possession;
pub mod config;
#[cfg(feature = "opencv")]
pub mod pipeline;
pub mod utils;

// Re-exports for convenience
pub use camera_motion::{CameraMotionConfig, CameraMovement, CoordinateTransformation};
#[cfg(feature = "opencv")]
pub use camera_motion::MotionEstimator;
pub use config::PipelineConfig;
pub use detection::{Detection, DetectorOutput, ObjectClass, RawDetection};
pub use distances::DistanceFunction;
pub use filter::{Filter, FilterConfig};
pub use frame::load_frames;
#[cfg(feature = "opencv")]
pub use pipeline::{FrameOutcome, Pipeline, PipelineOutput, PipelineSummary};
pub use team::Team;
pub use track::{TrackRecord, TrackSnapshot, Tracks};
pub use tracked_object::TrackedObject;
pub use tracker::{IdentityTracker, TrackerConfig, BALL_ID};
pub use utils::BBox;

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the pitchtrack library
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid detection: {0}")]
        InvalidDetection(String),

        #[error("Missing input: {0}")]
        MissingInput(String),

        #[error("Calibration error: {0}")]
        Calibration(String),

        #[error("Clustering error: {0}")]
        Clustering(String),

        #[error("Frame {index} is {got:?}, expected {expected:?}")]
        FrameSize {
            index: usize,
            expected: (u32, u32),
            got: (u32, u32),
        },

        #[error("Frame count mismatch: expected {expected}, got {got}")]
        FrameCount { expected: usize, got: usize },

        #[error("Image error: {0}")]
        Image(#[from] image::ImageError),

        #[cfg(feature = "opencv")]
        #[error("OpenCV error: {0}")]
        OpenCv(#[from] opencv::Error),

        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),

        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
    }

    /// Result type for pitchtrack operations
    pub type Result<T> = std::result::Result<T, Error>;
}
