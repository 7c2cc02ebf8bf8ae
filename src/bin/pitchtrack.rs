//! Command-line entry point: runs the full pipeline over a directory of
//! frames and a detector output file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use pitchtrack_rs::{
    load_frames, DetectorOutput, FrameOutcome, Pipeline, PipelineConfig, PipelineSummary, TrackSnapshot,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pitchtrack", about = "Identities, ground positions, speed, teams and possession from football detections")]
struct Args {
    /// Directory of frame images, processed in file name order.
    #[arg(long, value_name = "DIR")]
    frames: PathBuf,
    /// Detector output JSON, one list of boxes per frame.
    #[arg(long, value_name = "PATH")]
    detections: PathBuf,
    /// Where the pipeline output JSON is written.
    #[arg(long, value_name = "PATH")]
    output: PathBuf,
    /// Pipeline configuration JSON. Missing fields keep their defaults.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Track snapshot. Reused when the file exists, written after tracking otherwise.
    #[arg(long, value_name = "PATH")]
    stub: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pitchtrack=info")))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let frames = load_frames(&args.frames).with_context(|| format!("loading frames from {}", args.frames.display()))?;
    let detections = DetectorOutput::load(&args.detections)
        .with_context(|| format!("loading detections {}", args.detections.display()))?;
    if detections.frames.len() != frames.len() {
        bail!(
            "{} frames but detections for {} frames",
            frames.len(),
            detections.frames.len()
        );
    }
    info!(frames = frames.len(), "inputs loaded");

    let mut pipeline = Pipeline::new(config).context("building pipeline")?;

    let (tracks, outcomes) = match args.stub.as_deref().filter(|p| p.exists()) {
        Some(path) => {
            let snapshot = TrackSnapshot::load(path).with_context(|| format!("loading track stub {}", path.display()))?;
            info!(path = %path.display(), "reusing track stub");
            let outcomes = FrameOutcome::from_tracks(&snapshot.tracks);
            (snapshot.tracks, outcomes)
        }
        None => {
            let (tracks, outcomes) = pipeline.track(&detections.frames);
            if let Some(path) = &args.stub {
                save_stub(path, &tracks)?;
            }
            (tracks, outcomes)
        }
    };

    let output = pipeline.analyze(&frames, tracks, outcomes).context("running pipeline")?;
    output
        .save(&args.output)
        .with_context(|| format!("writing output {}", args.output.display()))?;

    print_summary(&output.summary());
    Ok(())
}

fn save_stub(path: &Path, tracks: &pitchtrack_rs::Tracks) -> Result<()> {
    TrackSnapshot::new(tracks.clone())
        .save(path)
        .with_context(|| format!("writing track stub {}", path.display()))
}

fn print_summary(summary: &PipelineSummary) {
    println!("{:<8} {:>5} {:>5} {:>10} {:>10}", "class", "id", "team", "km/h", "metres");
    for identity in &summary.identities {
        let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
        let team = identity.team.map_or_else(|| "-".to_string(), |t| t.id().to_string());
        println!(
            "{:<8} {:>5} {:>5} {:>10} {:>10}",
            identity.class.as_str(),
            identity.id,
            team,
            fmt(identity.speed),
            fmt(identity.distance)
        );
    }

    match summary.ball_control {
        Some((one, two)) => {
            println!("Team 1 ball control: {:.2}%", one * 100.0);
            println!("Team 2 ball control: {:.2}%", two * 100.0);
        }
        None => println!("Ball control: no team ever had the ball"),
    }
    if summary.skipped_frames > 0 {
        println!("Skipped frames: {}", summary.skipped_frames);
    }
}
