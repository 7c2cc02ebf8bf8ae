//! Camera motion compensation.
//!
//! - Corner detection and pyramidal optical flow over the image margins
//! - Per-frame displacement as the dominant flow vector
//! - Translation and homography coordinate transformations

mod config;
#[cfg(feature = "opencv")]
mod estimator;
#[cfg(feature = "opencv")]
mod features;
mod movement;
mod transformations;

pub use config::CameraMotionConfig;
#[cfg(feature = "opencv")]
pub use estimator::MotionEstimator;
#[cfg(feature = "opencv")]
pub use features::{band_mask, good_features_to_track, track_points, CornerParams, FlowParams};
pub use movement::CameraMovement;
#[cfg(feature = "opencv")]
pub use transformations::HomographyTransformation;
pub use transformations::{CoordinateTransformation, TranslationTransformation, TranslationTransformationGetter};
