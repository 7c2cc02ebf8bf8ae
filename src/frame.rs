//! Frame source: an ordered directory of raster images, plus the grayscale
//! matrices handed to the camera motion estimator.

use std::path::{Path, PathBuf};

use image::RgbImage;
#[cfg(feature = "opencv")]
use opencv::{
    core::{self, Mat, Scalar},
    imgproc,
    prelude::*,
};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{Error, Result};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// List the frame files of a directory, sorted by file name.
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::MissingInput(format!(
            "frames directory {} does not exist",
            dir.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_frame {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if paths.is_empty() {
        return Err(Error::MissingInput(format!(
            "frames directory {} contains no images",
            dir.display()
        )));
    }
    Ok(paths)
}

/// Decode every frame of a directory. All frames must share one size.
pub fn load_frames(dir: &Path) -> Result<Vec<RgbImage>> {
    let paths = list_frames(dir)?;
    debug!(count = paths.len(), dir = %dir.display(), "decoding frames");

    let frames = paths
        .par_iter()
        .map(|path| -> Result<RgbImage> { Ok(image::open(path)?.to_rgb8()) })
        .collect::<Result<Vec<_>>>()?;

    check_frame_sizes(&frames)?;
    info!(count = frames.len(), "loaded frames");
    Ok(frames)
}

/// Fail unless every frame has the dimensions of the first.
pub fn check_frame_sizes(frames: &[RgbImage]) -> Result<()> {
    let Some(first) = frames.first() else {
        return Ok(());
    };
    let expected = first.dimensions();
    for (index, frame) in frames.iter().enumerate() {
        if frame.dimensions() != expected {
            return Err(Error::FrameSize {
                index,
                expected,
                got: frame.dimensions(),
            });
        }
    }
    Ok(())
}

/// Copy an RGB frame into a three-channel `CV_8UC3` matrix.
#[cfg(feature = "opencv")]
pub fn rgb_to_mat(image: &RgbImage) -> Result<Mat> {
    let (width, height) = image.dimensions();
    let mut mat = Mat::new_rows_cols_with_default(height as i32, width as i32, core::CV_8UC3, Scalar::all(0.0))?;
    mat.data_bytes_mut()?.copy_from_slice(image.as_raw());
    Ok(mat)
}

/// Single-channel `CV_8UC1` intensity image of an RGB frame.
#[cfg(feature = "opencv")]
pub fn to_gray(image: &RgbImage) -> Result<Mat> {
    let rgb = rgb_to_mat(image)?;
    let mut gray = Mat::default();
    imgproc::cvt_color_def(&rgb, &mut gray, imgproc::COLOR_RGB2GRAY)?;
    Ok(gray)
}

/// Convert frames to grayscale. Frames are independent, so this runs in parallel.
#[cfg(feature = "opencv")]
pub fn to_gray_frames(frames: &[RgbImage]) -> Result<Vec<Mat>> {
    frames.par_iter().map(to_gray).collect()
}
