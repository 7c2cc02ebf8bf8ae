//! Fixture tests: detector output and configuration files as the binary
//! reads them from disk.

#![cfg(feature = "opencv")]

use std::path::PathBuf;

use approx::assert_relative_eq;
use image::{Rgb, RgbImage};
use pitchtrack_rs::detection::DetectorOutput;
use pitchtrack_rs::distances::DistanceFunction;
use pitchtrack_rs::filter::FilterConfig;
use pitchtrack_rs::{FrameOutcome, ObjectClass, Pipeline, PipelineConfig, BALL_ID};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

fn load_fixtures() -> (DetectorOutput, PipelineConfig) {
    let detections = DetectorOutput::load(&fixture("clip_detections.json")).expect("detections fixture");
    let mut config = PipelineConfig::load(&fixture("pipeline_config.json")).expect("config fixture");
    // 10 pixels per metre over the whole 960x540 frame.
    config.projection.pixel_vertices = [[0.0, 540.0], [0.0, 0.0], [960.0, 0.0], [960.0, 540.0]];
    config.projection.section_length = 96.0;
    config.projection.section_width = 54.0;
    (detections, config)
}

fn blank_frames(n: usize) -> Vec<RgbImage> {
    vec![RgbImage::from_pixel(960, 540, Rgb([30, 140, 40])); n]
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_fixture_config_overrides() {
    let (_, config) = load_fixtures();

    assert_eq!(config.tracker.distance_function, DistanceFunction::Centroid);
    assert_eq!(config.tracker.distance_threshold, 30.0);
    assert_eq!(config.tracker.hit_counter_max, 10);
    assert_eq!(config.tracker.initialization_delay, 0);
    assert_eq!(config.tracker.filter, FilterConfig::None);
    assert_eq!(config.kinematics.frame_rate, 25.0);
    assert_eq!(config.kinematics.classes, vec![ObjectClass::Player, ObjectClass::Ball]);
    assert_eq!(config.possession.max_player_ball_distance, 50.0);
    assert_eq!(config.team.seed, 7);
    assert_eq!(config.team.crop_restarts, 1);
}

// ============================================================================
// Tracking
// ============================================================================

#[test]
fn test_fixture_tracking() {
    let (detections, config) = load_fixtures();
    assert_eq!(detections.frames.len(), 6);

    let mut pipeline = Pipeline::new(config).unwrap();
    let (tracks, outcomes) = pipeline.track(&detections.frames);

    assert_eq!(tracks.num_frames(), 6);

    // Identities are issued in detection order; the goalkeeper is a player.
    assert_eq!(tracks.players[0].keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(tracks.referees[0].keys().copied().collect::<Vec<_>>(), vec![3]);

    // The more confident of the two balls wins.
    assert_eq!(tracks.ball[0][&BALL_ID].bbox.x1, 150.0);
    assert!(tracks.ball[2].is_empty());

    // Frame 3 carries a confidence above 1.
    match &outcomes[3] {
        FrameOutcome::Skipped { reason } => assert!(reason.contains("confidence")),
        other => panic!("expected a skipped frame, got {:?}", other),
    }
    assert!(tracks.players[3].is_empty());
    assert_eq!(outcomes.iter().filter(|o| o.is_skipped()).count(), 1);

    // Identities survive the skipped frame; the newcomer gets a fresh one.
    assert_eq!(tracks.players[4].keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(tracks.players[5].keys().copied().collect::<Vec<_>>(), vec![1, 2, 4]);
    assert!(tracks.referees[5].contains_key(&3));
    assert_eq!(pipeline.tracker().total_object_count(), 4);
}

// ============================================================================
// Later stages
// ============================================================================

#[test]
fn test_fixture_ball_interpolation_and_kinematics() {
    let (detections, config) = load_fixtures();
    let mut pipeline = Pipeline::new(config).unwrap();

    let output = pipeline.run(&blank_frames(6), &detections.frames).unwrap();
    let tracks = &output.tracks;

    let ball_x1: Vec<f64> = tracks.ball.iter().map(|f| f[&BALL_ID].bbox.x1).collect();
    assert_eq!(ball_x1, vec![150.0, 154.0, 158.0, 162.0, 166.0, 166.0]);

    // 12 px = 1.2 m over 3 frames at 25 fps, then 0.4 m over 2 frames.
    let ball = |t: usize| &tracks.ball[t][&BALL_ID];
    assert_relative_eq!(ball(0).speed.unwrap(), 36.0, epsilon = 1e-6);
    assert_relative_eq!(ball(2).distance.unwrap(), 1.2, epsilon = 1e-6);
    assert_relative_eq!(ball(3).speed.unwrap(), 18.0, epsilon = 1e-6);
    assert_relative_eq!(ball(5).distance.unwrap(), 1.6, epsilon = 1e-6);

    // Player 1 has no record in frame 3, where both of its windows meet.
    assert!(tracks.players.iter().flat_map(|f| f.get(&1)).all(|r| r.speed.is_none()));
    // Referees are not part of the configured classes.
    assert!(tracks.referees.iter().flat_map(|f| f.values()).all(|r| r.speed.is_none()));
}

#[test]
fn test_fixture_possession() {
    let (detections, config) = load_fixtures();
    let mut pipeline = Pipeline::new(config).unwrap();

    let output = pipeline.run(&blank_frames(6), &detections.frames).unwrap();
    let tracks = &output.tracks;

    assert!(tracks.players[0][&1].has_ball);
    assert!(!tracks.players[0][&2].has_ball);

    let control = &output.team_ball_control;
    assert_eq!(control.len(), 6);
    // No players in the skipped frame: control carries over.
    assert_eq!(control[3], control[2]);
}
