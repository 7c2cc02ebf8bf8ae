//! Identity tracker: stable numeric identities for players and referees.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detection::{Detection, ObjectClass};
use crate::distances::DistanceFunction;
use crate::filter::FilterConfig;
use crate::matching::{get_unmatched, match_detections_and_objects};
use crate::tracked_object::TrackedObject;
use crate::utils::BBox;
use crate::{Error, Result};

/// Identity of the ball in every frame it is known.
pub const BALL_ID: u32 = 1;

/// Configuration for the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Distance function for matching detections to objects.
    pub distance_function: DistanceFunction,

    /// Maximum distance for a valid match (inclusive).
    pub distance_threshold: f64,

    /// Maximum hit counter value (frames an object survives without detections).
    pub hit_counter_max: i32,

    /// Hits required before an object gets a permanent identity. 0 reports
    /// objects from their first frame.
    pub initialization_delay: i32,

    /// Motion filter built for every new object.
    pub filter: FilterConfig,
}

impl TrackerConfig {
    pub fn new(distance_function: DistanceFunction, distance_threshold: f64) -> Self {
        Self {
            distance_function,
            distance_threshold,
            hit_counter_max: 15,
            initialization_delay: 0,
            filter: FilterConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.distance_threshold > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "distance_threshold must be positive, got {}",
                self.distance_threshold
            )));
        }
        if self.hit_counter_max < 1 {
            return Err(Error::InvalidConfig(
                "hit_counter_max must be at least 1".to_string(),
            ));
        }
        if self.initialization_delay < 0 {
            return Err(Error::InvalidConfig(
                "initialization_delay must be non-negative".to_string(),
            ));
        }
        if self.initialization_delay >= self.hit_counter_max {
            return Err(Error::InvalidConfig(
                "initialization_delay must be less than hit_counter_max".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(DistanceFunction::Iou, 0.8)
    }
}

/// Tracker output for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameTracks {
    pub players: BTreeMap<u32, BBox>,
    pub referees: BTreeMap<u32, BBox>,
    /// Highest-confidence ball box of the frame, under [`BALL_ID`].
    pub ball: Option<BBox>,
}

/// Multi-object tracker for players and referees.
///
/// Maintains a set of tracked objects across frames, matching new detections
/// to predicted boxes and managing object lifecycles. The ball bypasses
/// association entirely.
pub struct IdentityTracker {
    pub config: TrackerConfig,

    /// Currently tracked objects, alive or decaying.
    pub tracked_objects: Vec<TrackedObject>,

    /// Last permanent identity issued.
    instance_id_counter: u32,
}

impl IdentityTracker {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tracked_objects: Vec::new(),
            instance_id_counter: 0,
        })
    }

    /// Drop every tracked object and restart identities from 1.
    pub fn reset(&mut self) {
        self.tracked_objects.clear();
        self.instance_id_counter = 0;
    }

    /// Feed one frame of detections, in frame order.
    ///
    /// Returns the boxes of the players and referees matched in this frame,
    /// keyed by identity, plus the frame's ball box.
    pub fn update(&mut self, detections: &[Detection]) -> FrameTracks {
        let (balls, people): (Vec<&Detection>, Vec<&Detection>) =
            detections.iter().partition(|d| d.class == ObjectClass::Ball);

        // Dead objects are removed before the predict step, so an object whose
        // counter just reached 0 survives one more frame.
        self.tracked_objects.retain(|obj| obj.hit_counter >= 0);

        for obj in &mut self.tracked_objects {
            obj.hit_counter -= 1;
            obj.matched_this_frame = false;
            obj.predict();
        }

        let (initialized, initializing): (Vec<usize>, Vec<usize>) =
            (0..self.tracked_objects.len()).partition(|&i| !self.tracked_objects[i].is_initializing);

        // Initialized objects get first pick of the detections.
        let all_dets: Vec<usize> = (0..people.len()).collect();
        let matched = self.match_group(&people, &all_dets, &initialized);
        let unmatched = get_unmatched(people.len(), matched.iter().map(|&(d, _)| d));

        let matched_init = self.match_group(&people, &unmatched, &initializing);
        let still_unmatched: Vec<usize> = {
            let used: Vec<usize> = matched_init.iter().map(|&(d, _)| d).collect();
            unmatched.into_iter().filter(|d| !used.contains(d)).collect()
        };

        for det_idx in still_unmatched {
            self.create_object(people[det_idx]);
        }

        let mut tracks = FrameTracks {
            ball: select_ball(&balls),
            ..Default::default()
        };
        for obj in self.tracked_objects.iter().filter(|o| o.is_visible()) {
            let Some(id) = obj.id else { continue };
            let target = match obj.class {
                ObjectClass::Player => &mut tracks.players,
                ObjectClass::Referee => &mut tracks.referees,
                ObjectClass::Ball => continue,
            };
            target.insert(id, obj.last_detection.bbox);
        }

        debug!(
            players = tracks.players.len(),
            referees = tracks.referees.len(),
            alive = self.tracked_objects.len(),
            "tracker update"
        );
        tracks
    }

    /// Total number of permanent identities issued so far.
    pub fn total_object_count(&self) -> u32 {
        self.instance_id_counter
    }

    /// Number of initialized objects that are still alive.
    pub fn current_object_count(&self) -> usize {
        self.tracked_objects
            .iter()
            .filter(|obj| !obj.is_initializing && obj.hit_counter >= 0)
            .count()
    }

    /// Match the detections `det_indices` against the objects `obj_indices`
    /// and update every matched object. Returns `(detection, object)` pairs
    /// as indices into `detections` and `tracked_objects`.
    fn match_group(
        &mut self,
        detections: &[&Detection],
        det_indices: &[usize],
        obj_indices: &[usize],
    ) -> Vec<(usize, usize)> {
        if det_indices.is_empty() || obj_indices.is_empty() {
            return Vec::new();
        }

        let distance_matrix: DMatrix<f64> = {
            let dets: Vec<&Detection> = det_indices.iter().map(|&i| detections[i]).collect();
            let objs: Vec<&TrackedObject> = obj_indices.iter().map(|&i| &self.tracked_objects[i]).collect();
            self.config.distance_function.get_distances(&objs, &dets)
        };

        match_detections_and_objects(&distance_matrix, self.config.distance_threshold)
            .into_iter()
            .map(|(local_det, local_obj)| {
                let det_idx = det_indices[local_det];
                let obj_idx = obj_indices[local_obj];
                self.hit_object(obj_idx, detections[det_idx]);
                (det_idx, obj_idx)
            })
            .collect()
    }

    fn hit_object(&mut self, obj_idx: usize, detection: &Detection) {
        let obj = &mut self.tracked_objects[obj_idx];

        // Matched objects gain a net +1 per frame after the -1 decay.
        obj.hit_counter = (obj.hit_counter + 2).min(self.config.hit_counter_max);
        obj.observe(detection);

        if obj.is_initializing && obj.hit_counter > self.config.initialization_delay {
            obj.is_initializing = false;
            self.instance_id_counter += 1;
            obj.id = Some(self.instance_id_counter);
        }
    }

    fn create_object(&mut self, detection: &Detection) {
        let filter = self.config.filter.create(&detection.points());
        let mut obj = TrackedObject::new(detection, filter, 1);

        if self.config.initialization_delay == 0 {
            obj.is_initializing = false;
            self.instance_id_counter += 1;
            obj.id = Some(self.instance_id_counter);
        }

        self.tracked_objects.push(obj);
    }
}

/// Pick the frame's ball box: the highest-confidence ball detection.
pub fn select_ball(balls: &[&Detection]) -> Option<BBox> {
    balls
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .map(|d| d.bbox)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(x: f64, y: f64) -> Detection {
        Detection::new(ObjectClass::Player, BBox::new(x, y, x + 20.0, y + 50.0), 0.9).unwrap()
    }

    fn referee(x: f64, y: f64) -> Detection {
        Detection::new(ObjectClass::Referee, BBox::new(x, y, x + 20.0, y + 50.0), 0.9).unwrap()
    }

    fn ball(x: f64, y: f64, confidence: f64) -> Detection {
        Detection::new(ObjectClass::Ball, BBox::new(x, y, x + 8.0, y + 8.0), confidence).unwrap()
    }

    // ===== Config Tests =====

    #[test]
    fn test_tracker_new_with_defaults() {
        let tracker = IdentityTracker::new(TrackerConfig::default()).unwrap();

        assert_eq!(tracker.config.distance_function, DistanceFunction::Iou);
        assert_eq!(tracker.config.initialization_delay, 0);
        assert!(tracker.tracked_objects.is_empty());
    }

    #[test]
    fn test_tracker_invalid_config() {
        let mut config = TrackerConfig::default();
        config.initialization_delay = 15;
        assert!(matches!(IdentityTracker::new(config), Err(Error::InvalidConfig(_))));

        let mut config = TrackerConfig::default();
        config.distance_threshold = 0.0;
        assert!(IdentityTracker::new(config).is_err());
    }

    #[test]
    fn test_tracker_config_partial_json() {
        let config: TrackerConfig = serde_json::from_str(r#"{"hit_counter_max": 30}"#).unwrap();
        assert_eq!(config.hit_counter_max, 30);
        assert_eq!(config.distance_threshold, 0.8);
    }

    // ===== Update Tests =====

    #[test]
    fn test_ids_start_at_one_and_persist() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default()).unwrap();

        let first = tracker.update(&[player(0.0, 0.0), player(200.0, 0.0)]);
        assert_eq!(first.players.keys().copied().collect::<Vec<_>>(), vec![1, 2]);

        let mut ids_by_position = Vec::new();
        for step in 1..10 {
            let dx = step as f64 * 2.0;
            let tracks = tracker.update(&[player(200.0 + dx, 0.0), player(dx, 0.0)]);
            assert_eq!(tracks.players.len(), 2);
            let left = tracks.players.iter().find(|(_, b)| b.x1 < 100.0).map(|(id, _)| *id);
            ids_by_position.push(left);
        }

        assert!(ids_by_position.iter().all(|id| *id == Some(1)));
        assert_eq!(tracker.total_object_count(), 2);
    }

    #[test]
    fn test_single_miss_keeps_identity() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default()).unwrap();

        tracker.update(&[player(0.0, 0.0)]);
        tracker.update(&[player(1.0, 0.0)]);
        let missed = tracker.update(&[]);
        assert!(missed.players.is_empty());

        let back = tracker.update(&[player(2.0, 0.0)]);
        assert_eq!(back.players.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(tracker.total_object_count(), 1);
    }

    #[test]
    fn test_ids_never_reused() {
        let mut tracker = IdentityTracker::new(TrackerConfig {
            hit_counter_max: 2,
            ..TrackerConfig::default()
        })
        .unwrap();

        tracker.update(&[player(0.0, 0.0)]);
        for _ in 0..5 {
            tracker.update(&[]);
        }
        assert!(tracker.tracked_objects.is_empty());

        let tracks = tracker.update(&[player(0.0, 0.0)]);
        assert_eq!(tracks.players.keys().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_classes_never_share_identity_track() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default()).unwrap();

        let first = tracker.update(&[referee(0.0, 0.0)]);
        assert_eq!(first.referees.len(), 1);

        // Same box, different class: a new object, not a match.
        let second = tracker.update(&[player(0.0, 0.0)]);
        assert!(second.referees.is_empty());
        assert_eq!(second.players.keys().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_initialization_delay_hides_new_objects() {
        let mut tracker = IdentityTracker::new(TrackerConfig {
            initialization_delay: 2,
            ..TrackerConfig::default()
        })
        .unwrap();

        assert!(tracker.update(&[player(0.0, 0.0)]).players.is_empty());
        assert!(tracker.update(&[player(0.0, 0.0)]).players.is_empty());
        let third = tracker.update(&[player(0.0, 0.0)]);
        assert_eq!(third.players.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_reported_box_is_detection_box() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default()).unwrap();
        tracker.update(&[player(0.0, 0.0)]);
        let tracks = tracker.update(&[player(3.0, 1.0)]);

        assert_eq!(tracks.players[&1], BBox::new(3.0, 1.0, 23.0, 51.0));
    }

    #[test]
    fn test_reset_restarts_identities() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default()).unwrap();
        tracker.update(&[player(0.0, 0.0), player(200.0, 0.0)]);
        assert_eq!(tracker.total_object_count(), 2);

        tracker.reset();
        assert!(tracker.tracked_objects.is_empty());
        assert_eq!(tracker.total_object_count(), 0);

        let tracks = tracker.update(&[player(500.0, 0.0)]);
        assert_eq!(tracks.players.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    // ===== Ball Tests =====

    #[test]
    fn test_ball_highest_confidence_wins() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default()).unwrap();
        let tracks = tracker.update(&[ball(0.0, 0.0, 0.4), ball(50.0, 50.0, 0.7), player(100.0, 0.0)]);

        assert_eq!(tracks.ball, Some(BBox::new(50.0, 50.0, 58.0, 58.0)));
        assert_eq!(tracks.players.len(), 1);
        assert_eq!(tracker.tracked_objects.len(), 1);
    }

    #[test]
    fn test_no_ball() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default()).unwrap();
        assert_eq!(tracker.update(&[player(0.0, 0.0)]).ball, None);
    }
}
