//! Track store: per-class, per-frame identity records.

use std::collections::BTreeMap;
use std::path::Path;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::detection::ObjectClass;
use crate::team::Team;
use crate::tracker::{FrameTracks, BALL_ID};
use crate::utils::BBox;
use crate::{Error, Result};

/// Everything known about one identity in one frame.
///
/// Stages fill the optional fields in pipeline order; `None` means the value
/// is unavailable for this frame, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub bbox: BBox,
    /// Pixel position: bbox centre for the ball, foot point otherwise.
    #[serde(default)]
    pub position: Option<Point2<f64>>,
    /// Position with the cumulative camera motion removed.
    #[serde(default)]
    pub position_adjusted: Option<Point2<f64>>,
    /// Ground position in metres, `None` outside the calibrated area.
    #[serde(default)]
    pub position_transformed: Option<Point2<f64>>,
    #[serde(default)]
    pub team: Option<Team>,
    #[serde(default)]
    pub team_color: Option<[f64; 3]>,
    #[serde(default)]
    pub has_ball: bool,
    /// km/h
    #[serde(default)]
    pub speed: Option<f64>,
    /// Cumulative metres.
    #[serde(default)]
    pub distance: Option<f64>,
}

impl TrackRecord {
    pub fn new(bbox: BBox) -> Self {
        Self {
            bbox,
            position: None,
            position_adjusted: None,
            position_transformed: None,
            team: None,
            team_color: None,
            has_ball: false,
            speed: None,
            distance: None,
        }
    }
}

/// One frame of one class: identity to record, ordered by identity.
pub type FrameRecords = BTreeMap<u32, TrackRecord>;

/// Accumulated tracks of a clip. Every class holds exactly one entry per frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tracks {
    pub players: Vec<FrameRecords>,
    pub referees: Vec<FrameRecords>,
    pub ball: Vec<FrameRecords>,
}

impl Tracks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_frames(&self) -> usize {
        self.players.len()
    }

    /// Append the tracker output for the next frame.
    pub fn push_frame(&mut self, frame: &FrameTracks) {
        let people = |boxes: &BTreeMap<u32, BBox>| -> FrameRecords {
            boxes.iter().map(|(&id, &bbox)| (id, TrackRecord::new(bbox))).collect()
        };
        self.players.push(people(&frame.players));
        self.referees.push(people(&frame.referees));
        self.ball.push(
            frame
                .ball
                .map(|bbox| (BALL_ID, TrackRecord::new(bbox)))
                .into_iter()
                .collect(),
        );
    }

    /// Append a frame with no records, keeping every class aligned.
    pub fn push_empty_frame(&mut self) {
        self.push_frame(&FrameTracks::default());
    }

    pub fn class(&self, class: ObjectClass) -> &[FrameRecords] {
        match class {
            ObjectClass::Player => &self.players,
            ObjectClass::Referee => &self.referees,
            ObjectClass::Ball => &self.ball,
        }
    }

    pub fn class_mut(&mut self, class: ObjectClass) -> &mut Vec<FrameRecords> {
        match class {
            ObjectClass::Player => &mut self.players,
            ObjectClass::Referee => &mut self.referees,
            ObjectClass::Ball => &mut self.ball,
        }
    }

    /// Every record of frame `t` across classes.
    pub fn frame_records_mut(&mut self, t: usize) -> impl Iterator<Item = &mut TrackRecord> {
        [&mut self.players, &mut self.referees, &mut self.ball]
            .into_iter()
            .filter_map(move |frames| frames.get_mut(t))
            .flat_map(|records| records.values_mut())
    }

    /// Derive the pixel position of every record from its box.
    pub fn add_positions(&mut self) {
        for class in ObjectClass::ALL {
            for records in self.class_mut(class) {
                for record in records.values_mut() {
                    record.position = Some(match class {
                        ObjectClass::Ball => record.bbox.center(),
                        ObjectClass::Player | ObjectClass::Referee => record.bbox.foot_position(),
                    });
                }
            }
        }
    }

    /// Fail unless every class holds one entry per frame.
    pub fn check_aligned(&self) -> Result<()> {
        let expected = self.players.len();
        for class in [ObjectClass::Referee, ObjectClass::Ball] {
            let got = self.class(class).len();
            if got != expected {
                return Err(Error::FrameCount { expected, got });
            }
        }
        Ok(())
    }
}

/// Persisted tracker output, reused instead of re-running the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub frame_count: usize,
    pub tracks: Tracks,
}

impl TrackSnapshot {
    pub fn new(tracks: Tracks) -> Self {
        Self {
            frame_count: tracks.num_frames(),
            tracks,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        info!(path = %path.display(), frames = self.frame_count, "saved track snapshot");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput(format!(
                "track snapshot {} does not exist",
                path.display()
            )));
        }
        let file = std::fs::File::open(path)?;
        let snapshot: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        snapshot.tracks.check_aligned()?;
        if snapshot.tracks.num_frames() != snapshot.frame_count {
            return Err(Error::FrameCount {
                expected: snapshot.frame_count,
                got: snapshot.tracks.num_frames(),
            });
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(players: &[(u32, BBox)], ball: Option<BBox>) -> FrameTracks {
        FrameTracks {
            players: players.iter().copied().collect(),
            referees: BTreeMap::new(),
            ball,
        }
    }

    #[test]
    fn test_push_frame_keeps_classes_aligned() {
        let mut tracks = Tracks::new();
        tracks.push_frame(&frame_with(&[(1, BBox::new(0.0, 0.0, 10.0, 20.0))], None));
        tracks.push_empty_frame();

        assert_eq!(tracks.num_frames(), 2);
        assert_eq!(tracks.referees.len(), 2);
        assert_eq!(tracks.ball.len(), 2);
        assert!(tracks.ball[0].is_empty());
        assert!(tracks.check_aligned().is_ok());
    }

    #[test]
    fn test_ball_uses_fixed_identity() {
        let mut tracks = Tracks::new();
        tracks.push_frame(&frame_with(&[], Some(BBox::new(0.0, 0.0, 4.0, 4.0))));

        assert!(tracks.ball[0].contains_key(&BALL_ID));
    }

    #[test]
    fn test_add_positions_per_class() {
        let mut tracks = Tracks::new();
        tracks.push_frame(&frame_with(
            &[(3, BBox::new(10.0, 20.0, 30.0, 60.0))],
            Some(BBox::new(0.0, 0.0, 4.0, 8.0)),
        ));
        tracks.add_positions();

        assert_eq!(tracks.players[0][&3].position, Some(Point2::new(20.0, 60.0)));
        assert_eq!(tracks.ball[0][&BALL_ID].position, Some(Point2::new(2.0, 4.0)));
    }

    #[test]
    fn test_frame_records_mut_spans_classes() {
        let mut tracks = Tracks::new();
        tracks.push_frame(&frame_with(
            &[(1, BBox::new(0.0, 0.0, 1.0, 1.0)), (2, BBox::new(2.0, 0.0, 3.0, 1.0))],
            Some(BBox::new(0.0, 0.0, 1.0, 1.0)),
        ));

        assert_eq!(tracks.frame_records_mut(0).count(), 3);
        assert_eq!(tracks.frame_records_mut(1).count(), 0);
    }

    #[test]
    fn test_misaligned_tracks_rejected() {
        let mut tracks = Tracks::new();
        tracks.push_empty_frame();
        tracks.ball.push(BTreeMap::new());

        assert!(matches!(tracks.check_aligned(), Err(Error::FrameCount { expected: 1, got: 2 })));
    }

    #[test]
    fn test_snapshot_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stubs").join("tracks.json");

        let mut tracks = Tracks::new();
        tracks.push_frame(&frame_with(&[(7, BBox::new(1.0, 2.0, 3.0, 4.0))], None));
        TrackSnapshot::new(tracks.clone()).save(&path).unwrap();

        let loaded = TrackSnapshot::load(&path).unwrap();
        assert_eq!(loaded.frame_count, 1);
        assert_eq!(loaded.tracks, tracks);
    }

    #[test]
    fn test_snapshot_missing_file() {
        let result = TrackSnapshot::load(Path::new("/no/such/snapshot.json"));
        assert!(matches!(result, Err(Error::MissingInput(_))));
    }
}
