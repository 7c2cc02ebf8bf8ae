//! Ball possession: nearest player within a pixel threshold, with
//! carry-forward of the controlling team.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::team::Team;
use crate::track::{FrameRecords, Tracks};
use crate::tracker::BALL_ID;
use crate::utils::{measure_distance, BBox};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PossessionConfig {
    /// Largest ball-to-foot distance (pixels) that still grants possession.
    pub max_player_ball_distance: f64,
}

impl Default for PossessionConfig {
    fn default() -> Self {
        Self {
            max_player_ball_distance: 70.0,
        }
    }
}

impl PossessionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_player_ball_distance >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max_player_ball_distance must be non-negative, got {}",
                self.max_player_ball_distance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PlayerBallAssigner {
    config: PossessionConfig,
}

impl PlayerBallAssigner {
    pub fn new(config: PossessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Player closest to the ball, measured from the ball centre to the
    /// nearer bottom corner of the player's box. A distance equal to the
    /// threshold still counts. Ties go to the lowest identity.
    pub fn assign_ball_to_player(&self, players: &FrameRecords, ball_bbox: &BBox) -> Option<u32> {
        let ball = ball_bbox.center();
        let mut best: Option<(u32, f64)> = None;

        for (&id, record) in players {
            let bbox = &record.bbox;
            let left = measure_distance(&nalgebra::Point2::new(bbox.x1, bbox.y2), &ball);
            let right = measure_distance(&nalgebra::Point2::new(bbox.x2, bbox.y2), &ball);
            let distance = left.min(right);

            if distance <= self.config.max_player_ball_distance
                && best.map_or(true, |(_, d)| distance < d)
            {
                best = Some((id, distance));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Mark possessing players with `has_ball` and return the team in
    /// control of the ball for every frame.
    ///
    /// A frame without a resolved possessor repeats the previous frame's
    /// team; the sequence starts from [`Team::Neutral`].
    pub fn resolve(&self, tracks: &mut Tracks) -> Vec<Team> {
        let mut control = Vec::with_capacity(tracks.num_frames());
        let mut current = Team::Neutral;

        for (players, ball) in tracks.players.iter_mut().zip(tracks.ball.iter()) {
            let holder = ball
                .get(&BALL_ID)
                .and_then(|record| self.assign_ball_to_player(players, &record.bbox));

            if let Some(record) = holder.and_then(|id| players.get_mut(&id)) {
                record.has_ball = true;
                current = record.team.unwrap_or_default();
            }
            control.push(current);
        }

        debug!(frames = control.len(), "resolved ball possession");
        control
    }
}

/// Share of possession of each team over the frames where one of the two
/// teams controlled the ball, as fractions summing to 1.
pub fn ball_control_share(control: &[Team]) -> Option<(f64, f64)> {
    let one = control.iter().filter(|t| **t == Team::One).count();
    let two = control.iter().filter(|t| **t == Team::Two).count();
    let total = one + two;
    if total == 0 {
        return None;
    }
    Some((one as f64 / total as f64, two as f64 / total as f64))
}
