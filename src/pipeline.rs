//! Strictly ordered stage driver.
//!
//! Tracking runs frame by frame; every later stage is a single pass over the
//! whole clip, in this order:
//!
//! 1. ball interpolation
//! 2. pixel positions
//! 3. camera motion estimation and position adjustment
//! 4. ground projection
//! 5. speed and distance
//! 6. team calibration and assignment
//! 7. ball possession

use std::collections::BTreeMap;
use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::camera_motion::{CameraMovement, MotionEstimator};
use crate::config::PipelineConfig;
use crate::detection::{adapt_frames, ObjectClass, RawDetection};
use crate::frame::{check_frame_sizes, to_gray_frames};
use crate::interpolation::interpolate_ball_positions;
use crate::kinematics::SpeedAndDistanceEstimator;
use crate::possession::{ball_control_share, PlayerBallAssigner};
use crate::projection::GroundProjector;
use crate::team::{Team, TeamClassifier};
use crate::track::Tracks;
use crate::tracker::IdentityTracker;
use crate::{Error, Result};

/// What happened to one frame during tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameOutcome {
    Tracked {
        players: usize,
        referees: usize,
        ball: bool,
    },
    /// The frame's detections were rejected; it carries no records.
    Skipped { reason: String },
}

impl FrameOutcome {
    /// Outcomes of previously tracked frames, as when reusing a snapshot.
    pub fn from_tracks(tracks: &Tracks) -> Vec<FrameOutcome> {
        tracks
            .players
            .iter()
            .zip(&tracks.referees)
            .zip(&tracks.ball)
            .map(|((players, referees), ball)| FrameOutcome::Tracked {
                players: players.len(),
                referees: referees.len(),
                ball: !ball.is_empty(),
            })
            .collect()
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FrameOutcome::Skipped { .. })
    }
}

/// Result of a full pipeline run, consumed by renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub tracks: Tracks,
    pub camera_movement: CameraMovement,
    /// Team controlling the ball in every frame.
    pub team_ball_control: Vec<Team>,
    pub outcomes: Vec<FrameOutcome>,
}

impl PipelineOutput {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        info!(path = %path.display(), "saved pipeline output");
        Ok(())
    }

    /// Last known speed, distance and team of every identity.
    pub fn summary(&self) -> PipelineSummary {
        let mut identities: BTreeMap<(ObjectClass, u32), IdentitySummary> = BTreeMap::new();

        for class in ObjectClass::ALL {
            for records in self.tracks.class(class) {
                for (&id, record) in records {
                    let entry = identities.entry((class, id)).or_insert(IdentitySummary {
                        class,
                        id,
                        team: None,
                        speed: None,
                        distance: None,
                        frames: 0,
                    });
                    entry.frames += 1;
                    entry.speed = record.speed.or(entry.speed);
                    entry.distance = record.distance.or(entry.distance);
                    entry.team = record.team.or(entry.team);
                }
            }
        }

        PipelineSummary {
            identities: identities.into_values().collect(),
            ball_control: ball_control_share(&self.team_ball_control),
            skipped_frames: self.outcomes.iter().filter(|o| o.is_skipped()).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentitySummary {
    pub class: ObjectClass,
    pub id: u32,
    pub team: Option<Team>,
    /// km/h
    pub speed: Option<f64>,
    /// metres
    pub distance: Option<f64>,
    /// Frames in which the identity has a record.
    pub frames: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSummary {
    /// Ordered by class, then identity.
    pub identities: Vec<IdentitySummary>,
    /// Fraction of controlled frames per team, `None` if neither team ever had the ball.
    pub ball_control: Option<(f64, f64)>,
    pub skipped_frames: usize,
}

/// Owns every stage. Per-clip state is reset at the start of each clip, so
/// one pipeline can process several clips in turn.
pub struct Pipeline {
    tracker: IdentityTracker,
    motion: MotionEstimator,
    projector: GroundProjector,
    kinematics: SpeedAndDistanceEstimator,
    teams: TeamClassifier,
    possession: PlayerBallAssigner,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tracker: IdentityTracker::new(config.tracker)?,
            motion: MotionEstimator::new(config.camera_motion)?,
            projector: GroundProjector::new(&config.projection)?,
            kinematics: SpeedAndDistanceEstimator::new(config.kinematics)?,
            teams: TeamClassifier::new(config.team),
            possession: PlayerBallAssigner::new(config.possession)?,
        })
    }

    pub fn tracker(&self) -> &IdentityTracker {
        &self.tracker
    }

    /// Run the tracker over every frame of detections.
    ///
    /// A frame with a malformed detection degrades to an empty frame: the
    /// tracker still advances so identities keep decaying, and the frame is
    /// reported as [`FrameOutcome::Skipped`].
    pub fn track(&mut self, detections: &[Vec<RawDetection>]) -> (Tracks, Vec<FrameOutcome>) {
        self.tracker.reset();
        let mut tracks = Tracks::new();
        let mut outcomes = Vec::with_capacity(detections.len());

        for (t, adapted) in adapt_frames(detections).into_iter().enumerate() {
            match adapted {
                Ok(frame_detections) => {
                    let frame = self.tracker.update(&frame_detections);
                    outcomes.push(FrameOutcome::Tracked {
                        players: frame.players.len(),
                        referees: frame.referees.len(),
                        ball: frame.ball.is_some(),
                    });
                    tracks.push_frame(&frame);
                }
                Err(err) => {
                    warn!(frame = t, error = %err, "skipping frame with invalid detections");
                    self.tracker.update(&[]);
                    tracks.push_empty_frame();
                    outcomes.push(FrameOutcome::Skipped {
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            frames = tracks.num_frames(),
            identities = self.tracker.total_object_count(),
            alive = self.tracker.current_object_count(),
            "tracking complete"
        );
        (tracks, outcomes)
    }

    /// Track the detections, then run every later stage over the frames.
    pub fn run(&mut self, frames: &[RgbImage], detections: &[Vec<RawDetection>]) -> Result<PipelineOutput> {
        let (tracks, outcomes) = self.track(detections);
        self.analyze(frames, tracks, outcomes)
    }

    /// Run every stage after tracking over already tracked frames.
    pub fn analyze(
        &mut self,
        frames: &[RgbImage],
        mut tracks: Tracks,
        outcomes: Vec<FrameOutcome>,
    ) -> Result<PipelineOutput> {
        tracks.check_aligned()?;
        if frames.len() != tracks.num_frames() {
            return Err(Error::FrameCount {
                expected: tracks.num_frames(),
                got: frames.len(),
            });
        }
        check_frame_sizes(frames)?;
        self.teams.reset();

        tracks.ball = interpolate_ball_positions(&tracks.ball);
        tracks.add_positions();

        let camera_movement = self.motion.estimate(&to_gray_frames(frames)?)?;
        camera_movement.adjust_positions(&mut tracks)?;

        self.projector.transform_tracks(&mut tracks)?;
        self.kinematics.compute(&mut tracks);
        self.teams.assign_teams(frames, &mut tracks)?;
        let team_ball_control = self.possession.resolve(&mut tracks);

        info!(frames = tracks.num_frames(), "pipeline complete");
        Ok(PipelineOutput {
            tracks,
            camera_movement,
            team_ball_control,
            outcomes,
        })
    }
}
