//! Team classification from jersey colours.

use std::collections::{BTreeMap, HashMap};

use image::RgbImage;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::internal::kmeans::KMeans;
use crate::track::Tracks;
use crate::utils::BBox;
use crate::Result;

/// Team affiliation. `Neutral` is reported when classification is disabled
/// or not possible. Serialized as its numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Team {
    #[default]
    Neutral,
    One,
    Two,
}

impl Team {
    pub fn id(self) -> u8 {
        match self {
            Team::Neutral => 0,
            Team::One => 1,
            Team::Two => 2,
        }
    }

    fn from_cluster(index: usize) -> Self {
        if index == 0 {
            Team::One
        } else {
            Team::Two
        }
    }
}

impl From<Team> for u8 {
    fn from(team: Team) -> Self {
        team.id()
    }
}

impl TryFrom<u8> for Team {
    type Error = String;

    fn try_from(id: u8) -> std::result::Result<Self, Self::Error> {
        match id {
            0 => Ok(Team::Neutral),
            1 => Ok(Team::One),
            2 => Ok(Team::Two),
            other => Err(format!("invalid team id {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    /// Seed of every random draw made by the clustering.
    pub seed: u64,
    /// k-means restarts when separating a jersey from its background.
    pub crop_restarts: usize,
    /// k-means restarts when fitting the two team prototypes.
    pub prototype_restarts: usize,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            crop_restarts: 1,
            prototype_restarts: 10,
        }
    }
}

/// Two-team jersey colour classifier with per-identity memoization.
///
/// Calibrated once from a reference frame. A player's first classification
/// sticks for the rest of the run.
#[derive(Debug, Clone)]
pub struct TeamClassifier {
    config: TeamConfig,
    prototypes: Option<KMeans>,
    memo: HashMap<u32, Team>,
    rng: StdRng,
}

impl TeamClassifier {
    pub fn new(config: TeamConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            prototypes: None,
            memo: HashMap::new(),
            rng,
        }
    }

    /// Forget the prototypes and every memoized team, and reseed.
    pub fn reset(&mut self) {
        self.prototypes = None;
        self.memo.clear();
        self.rng = StdRng::seed_from_u64(self.config.seed);
    }

    /// Whether calibration produced two team prototypes.
    pub fn is_enabled(&self) -> bool {
        self.prototypes.is_some()
    }

    /// Prototype colour of a team, `None` for neutral or when disabled.
    pub fn team_color(&self, team: Team) -> Option<[f64; 3]> {
        let prototypes = self.prototypes.as_ref()?;
        let index = match team {
            Team::Neutral => return None,
            Team::One => 0,
            Team::Two => 1,
        };
        prototypes.centroids.get(index).map(|c| [c.x, c.y, c.z])
    }

    /// Fit the two team prototypes from the players of a reference frame.
    ///
    /// With fewer than two usable players classification stays disabled and
    /// every lookup returns [`Team::Neutral`].
    pub fn assign_team_color(&mut self, frame: &RgbImage, players: &BTreeMap<u32, BBox>) -> Result<()> {
        let seed = self.config.seed;
        let restarts = self.config.crop_restarts;
        let colors: Vec<Vector3<f64>> = players
            .par_iter()
            .filter_map(|(&id, bbox)| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(id as u64));
                player_color(frame, bbox, restarts, &mut rng)
            })
            .collect();

        if colors.len() < 2 {
            warn!(players = colors.len(), "too few players to calibrate teams; team classification disabled");
            self.prototypes = None;
            return Ok(());
        }

        let prototypes = KMeans::fit(&colors, 2, self.config.prototype_restarts, &mut self.rng)?;
        info!(
            team_one = ?prototypes.centroids[0].as_slice(),
            team_two = ?prototypes.centroids[1].as_slice(),
            "calibrated team colours"
        );
        self.prototypes = Some(prototypes);
        Ok(())
    }

    /// Team of a player, classified on first sight and memoized by identity.
    pub fn get_player_team(&mut self, frame: &RgbImage, bbox: &BBox, id: u32) -> Team {
        if let Some(team) = self.memo.get(&id) {
            return *team;
        }
        let Some(prototypes) = self.prototypes.as_ref() else {
            return Team::Neutral;
        };
        let Some(color) = player_color(frame, bbox, self.config.crop_restarts, &mut self.rng) else {
            debug!(id, "empty player crop");
            return Team::Neutral;
        };

        let team = Team::from_cluster(prototypes.predict(&color));
        *self.memo.entry(id).or_insert(team)
    }

    /// Fill `team` and `team_color` of every player record, calibrating on
    /// the first frame.
    pub fn assign_teams(&mut self, frames: &[RgbImage], tracks: &mut Tracks) -> Result<()> {
        if let (Some(frame), Some(players)) = (frames.first(), tracks.players.first()) {
            let boxes: BTreeMap<u32, BBox> = players.iter().map(|(&id, record)| (id, record.bbox)).collect();
            self.assign_team_color(frame, &boxes)?;
        }

        for (frame, players) in frames.iter().zip(tracks.players.iter_mut()) {
            for (&id, record) in players.iter_mut() {
                let team = self.get_player_team(frame, &record.bbox, id);
                record.team = Some(team);
                record.team_color = self.team_color(team);
            }
        }
        Ok(())
    }
}

/// Jersey colour of a player: the top half of its crop is split into two
/// colour clusters and the one not dominating the crop corners is the jersey.
pub fn player_color(frame: &RgbImage, bbox: &BBox, restarts: usize, rng: &mut StdRng) -> Option<Vector3<f64>> {
    let (x, y, width, height) = bbox.pixel_bounds(frame.width(), frame.height())?;
    let top_height = (height / 2).max(1);

    let mut pixels = Vec::with_capacity((width * top_height) as usize);
    for row in y..y + top_height {
        for col in x..x + width {
            let p = frame.get_pixel(col, row);
            pixels.push(Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64));
        }
    }
    if pixels.len() < 2 {
        return pixels.first().copied();
    }

    let model = KMeans::fit(&pixels, 2, restarts, rng).ok()?;
    let labels = model.labels(&pixels);

    let w = width as usize;
    let h = top_height as usize;
    let corners = [0, w - 1, (h - 1) * w, (h - 1) * w + w - 1];
    let background_votes = corners.iter().filter(|&&i| labels[i] == 1).count();
    // Ties resolve to cluster 0 as background.
    let background = if background_votes > corners.len() / 2 { 1 } else { 0 };

    Some(model.centroids[1 - background])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const GRASS: Rgb<u8> = Rgb([30, 140, 40]);
    const RED: Rgb<u8> = Rgb([220, 20, 30]);
    const BLUE: Rgb<u8> = Rgb([20, 40, 210]);

    /// Paint a 20x40 player whose shirt covers the central columns of the
    /// top half, leaving grass at the crop corners.
    fn paint_player(image: &mut RgbImage, x: u32, y: u32, shirt: Rgb<u8>) -> BBox {
        for row in y + 4..y + 20 {
            for col in x + 5..x + 15 {
                image.put_pixel(col, row, shirt);
            }
        }
        BBox::new(x as f64, y as f64, (x + 20) as f64, (y + 40) as f64)
    }

    fn pitch() -> RgbImage {
        RgbImage::from_pixel(200, 100, GRASS)
    }

    fn two_team_frame() -> (RgbImage, BTreeMap<u32, BBox>) {
        let mut image = pitch();
        let mut players = BTreeMap::new();
        players.insert(1, paint_player(&mut image, 10, 10, RED));
        players.insert(2, paint_player(&mut image, 50, 10, BLUE));
        players.insert(3, paint_player(&mut image, 90, 10, RED));
        players.insert(4, paint_player(&mut image, 130, 10, BLUE));
        (image, players)
    }

    #[test]
    fn test_player_color_is_jersey_not_grass() {
        let mut image = pitch();
        let bbox = paint_player(&mut image, 10, 10, RED);

        let color = player_color(&image, &bbox, 1, &mut StdRng::seed_from_u64(0)).unwrap();
        assert!((color - Vector3::new(220.0, 20.0, 30.0)).norm() < 1.0);
    }

    #[test]
    fn test_two_teams_separated() {
        let (image, players) = two_team_frame();
        let mut classifier = TeamClassifier::new(TeamConfig::default());
        classifier.assign_team_color(&image, &players).unwrap();

        assert!(classifier.is_enabled());
        let teams: Vec<Team> = players
            .iter()
            .map(|(&id, bbox)| classifier.get_player_team(&image, bbox, id))
            .collect();

        assert_eq!(teams[0], teams[2]);
        assert_eq!(teams[1], teams[3]);
        assert_ne!(teams[0], teams[1]);
        assert!(teams.iter().all(|t| *t != Team::Neutral));
    }

    #[test]
    fn test_assignment_is_idempotent_after_color_change() {
        let (image, players) = two_team_frame();
        let mut classifier = TeamClassifier::new(TeamConfig::default());
        classifier.assign_team_color(&image, &players).unwrap();

        let first = classifier.get_player_team(&image, &players[&1], 1);

        // Player 1 now appears in the other team's colour.
        let mut later = pitch();
        let bbox = paint_player(&mut later, 10, 10, BLUE);
        let second = classifier.get_player_team(&later, &bbox, 1);

        assert_eq!(first, second);
        assert_eq!(classifier.get_player_team(&later, &bbox, 1), first);
    }

    #[test]
    fn test_single_player_disables_classification() {
        let mut image = pitch();
        let mut players = BTreeMap::new();
        players.insert(1, paint_player(&mut image, 10, 10, RED));

        let mut classifier = TeamClassifier::new(TeamConfig::default());
        classifier.assign_team_color(&image, &players).unwrap();

        assert!(!classifier.is_enabled());
        assert_eq!(classifier.get_player_team(&image, &players[&1], 1), Team::Neutral);
        assert_eq!(classifier.team_color(Team::One), None);
    }

    #[test]
    fn test_empty_crop_is_neutral_and_not_memoized() {
        let (image, players) = two_team_frame();
        let mut classifier = TeamClassifier::new(TeamConfig::default());
        classifier.assign_team_color(&image, &players).unwrap();

        let offscreen = BBox::new(500.0, 500.0, 520.0, 540.0);
        assert_eq!(classifier.get_player_team(&image, &offscreen, 9), Team::Neutral);

        let visible = classifier.get_player_team(&image, &players[&1], 9);
        assert_ne!(visible, Team::Neutral);
    }

    #[test]
    fn test_team_color_matches_prototype() {
        let (image, players) = two_team_frame();
        let mut classifier = TeamClassifier::new(TeamConfig::default());
        classifier.assign_team_color(&image, &players).unwrap();

        let team = classifier.get_player_team(&image, &players[&1], 1);
        let color = classifier.team_color(team).unwrap();
        assert!((color[0] - 220.0).abs() < 1.0);
    }

    fn two_team_tracks(players: &BTreeMap<u32, BBox>, frames: usize) -> Tracks {
        let frame = crate::tracker::FrameTracks {
            players: players.clone(),
            ..Default::default()
        };
        let mut tracks = Tracks::new();
        for _ in 0..frames {
            tracks.push_frame(&frame);
        }
        tracks
    }

    #[test]
    fn test_assign_teams_fills_every_record() {
        let (image, players) = two_team_frame();
        let mut tracks = two_team_tracks(&players, 2);
        let mut classifier = TeamClassifier::new(TeamConfig::default());

        classifier
            .assign_teams(&[image.clone(), image], &mut tracks)
            .unwrap();

        assert!(classifier.is_enabled());
        for frame in &tracks.players {
            assert_eq!(frame[&1].team, frame[&3].team);
            assert_eq!(frame[&2].team, frame[&4].team);
            assert_ne!(frame[&1].team, frame[&2].team);
            assert!(frame.values().all(|r| r.team_color.is_some()));
        }
    }

    #[test]
    fn test_reset_forgets_calibration_and_memo() {
        let (image, players) = two_team_frame();
        let mut classifier = TeamClassifier::new(TeamConfig::default());
        classifier.assign_team_color(&image, &players).unwrap();
        classifier.get_player_team(&image, &players[&1], 1);

        classifier.reset();

        assert!(!classifier.is_enabled());
        assert_eq!(classifier.get_player_team(&image, &players[&1], 1), Team::Neutral);
    }

    #[test]
    fn test_team_serializes_as_id() {
        assert_eq!(serde_json::to_string(&Team::Two).unwrap(), "2");
        assert_eq!(serde_json::from_str::<Team>("1").unwrap(), Team::One);
        assert!(serde_json::from_str::<Team>("7").is_err());
    }
}
