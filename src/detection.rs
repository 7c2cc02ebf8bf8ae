//! Detection adapter: normalizes raw detector output into tracker input.

use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::BBox;
use crate::{Error, Result};

/// Class label as emitted by the external detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorClass {
    Player,
    Goalkeeper,
    Referee,
    Ball,
}

impl DetectorClass {
    /// Parse a detector label. Labels are matched case-insensitively.
    pub fn from_label(label: &str) -> Result<Self> {
        match label.to_ascii_lowercase().as_str() {
            "player" => Ok(DetectorClass::Player),
            "goalkeeper" => Ok(DetectorClass::Goalkeeper),
            "referee" => Ok(DetectorClass::Referee),
            "ball" => Ok(DetectorClass::Ball),
            other => Err(Error::InvalidDetection(format!("unknown class label '{}'", other))),
        }
    }

    /// Goalkeepers are tracked as players.
    pub fn normalize(self) -> ObjectClass {
        match self {
            DetectorClass::Player | DetectorClass::Goalkeeper => ObjectClass::Player,
            DetectorClass::Referee => ObjectClass::Referee,
            DetectorClass::Ball => ObjectClass::Ball,
        }
    }
}

/// Class of a tracked entity after normalization. There is no goalkeeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    Player,
    Referee,
    Ball,
}

impl ObjectClass {
    pub const ALL: [ObjectClass; 3] = [ObjectClass::Player, ObjectClass::Referee, ObjectClass::Ball];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClass::Player => "player",
            ObjectClass::Referee => "referee",
            ObjectClass::Ball => "ball",
        }
    }
}

/// One box reported by the detector, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Detector class label (`player`, `goalkeeper`, `referee`, `ball`).
    #[serde(rename = "class")]
    pub label: String,
    /// `[x1, y1, x2, y2]` in pixels.
    pub bbox: [f64; 4],
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
}

impl RawDetection {
    pub fn new(label: &str, bbox: [f64; 4], confidence: f64) -> Self {
        Self {
            label: label.to_string(),
            bbox,
            confidence,
        }
    }
}

/// A validated, normalized detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class: ObjectClass,
    pub bbox: BBox,
    pub confidence: f64,
}

impl Detection {
    /// Create a detection, validating the box and confidence.
    pub fn new(class: ObjectClass, bbox: BBox, confidence: f64) -> Result<Self> {
        if !bbox.is_well_formed() {
            return Err(Error::InvalidDetection(format!(
                "malformed bbox {:?}",
                bbox.as_array()
            )));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::InvalidDetection(format!(
                "confidence {} outside [0, 1]",
                confidence
            )));
        }
        Ok(Self {
            class,
            bbox,
            confidence,
        })
    }

    /// Adapt a raw detector record.
    pub fn from_raw(raw: &RawDetection) -> Result<Self> {
        let class = DetectorClass::from_label(&raw.label)?.normalize();
        Self::new(class, BBox::from(raw.bbox), raw.confidence)
    }

    /// Box corners as a 2x2 point matrix `[[x1, y1], [x2, y2]]` for the filters.
    pub fn points(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &self.bbox.as_array())
    }
}

/// Adapt one frame of raw detections. Any malformed record fails the frame.
pub fn adapt_frame(raw: &[RawDetection]) -> Result<Vec<Detection>> {
    raw.iter().map(Detection::from_raw).collect()
}

/// Adapt every frame independently. Frames share no state, so this runs in parallel.
pub fn adapt_frames(raw_frames: &[Vec<RawDetection>]) -> Vec<Result<Vec<Detection>>> {
    raw_frames.par_iter().map(|frame| adapt_frame(frame)).collect()
}

/// Detector output for a whole clip: one list of boxes per frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorOutput {
    pub frames: Vec<Vec<RawDetection>>,
}

impl DetectorOutput {
    /// Load the detector output from a JSON file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput(format!(
                "detections file {} does not exist",
                path.display()
            )));
        }
        let file = std::fs::File::open(path)?;
        let output = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(output)
    }
}
