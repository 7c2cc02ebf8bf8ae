//! Ground-plane projection: pixel positions to metres on the field.

#[cfg(feature = "opencv")]
use nalgebra::Point2;
#[cfg(feature = "opencv")]
use opencv::{
    core::{Point2f, Vector},
    imgproc,
};
use serde::{Deserialize, Serialize};
#[cfg(feature = "opencv")]
use tracing::debug;

#[cfg(feature = "opencv")]
use crate::camera_motion::{CoordinateTransformation, HomographyTransformation};
#[cfg(feature = "opencv")]
use crate::track::Tracks;
#[cfg(feature = "opencv")]
use crate::{Error, Result};

/// Four pixel vertices of a field section and its size in metres.
///
/// Vertices are, in order: bottom-left, top-left, top-right, bottom-right of
/// the section as seen in the image. They map to `(0, width)`, `(0, 0)`,
/// `(length, 0)` and `(length, width)` on the ground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub pixel_vertices: [[f64; 2]; 4],
    /// Extent along the ground x axis, in metres.
    pub section_length: f64,
    /// Extent along the ground y axis, in metres.
    pub section_width: f64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            pixel_vertices: [[110.0, 1035.0], [265.0, 275.0], [910.0, 260.0], [1640.0, 915.0]],
            section_length: 23.32,
            section_width: 68.0,
        }
    }
}

#[cfg(feature = "opencv")]
impl ProjectionConfig {
    fn ground_vertices(&self) -> [Point2<f64>; 4] {
        [
            Point2::new(0.0, self.section_width),
            Point2::new(0.0, 0.0),
            Point2::new(self.section_length, 0.0),
            Point2::new(self.section_length, self.section_width),
        ]
    }

    fn pixel_points(&self) -> [Point2<f64>; 4] {
        self.pixel_vertices.map(|[x, y]| Point2::new(x, y))
    }
}

/// Maps pixel positions to ground coordinates through a fixed homography.
#[cfg(feature = "opencv")]
pub struct GroundProjector {
    polygon: Vector<Point2f>,
    transform: HomographyTransformation,
}

#[cfg(feature = "opencv")]
impl GroundProjector {
    pub fn new(config: &ProjectionConfig) -> Result<Self> {
        if !(config.section_length > 0.0 && config.section_width > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "field section must have positive size, got {} x {}",
                config.section_length, config.section_width
            )));
        }
        let pixels = config.pixel_points();
        // Absolute coordinates are the ground, relative ones the image.
        let transform = HomographyTransformation::from_correspondences(&config.ground_vertices(), &pixels)?;
        let polygon = pixels.iter().map(|p| Point2f::new(p.x as f32, p.y as f32)).collect();
        Ok(Self { polygon, transform })
    }

    /// Whether a pixel lies inside the calibrated quadrilateral or on its edge.
    pub fn contains(&self, pixel: &Point2<f64>) -> Result<bool> {
        let point = Point2f::new(pixel.x as f32, pixel.y as f32);
        Ok(imgproc::point_polygon_test(&self.polygon, point, false)? >= 0.0)
    }

    /// Ground position of a pixel, `None` outside the calibrated quadrilateral.
    pub fn project(&self, pixel: &Point2<f64>) -> Result<Option<Point2<f64>>> {
        if !self.contains(pixel)? {
            return Ok(None);
        }
        Ok(Some(self.transform.point_rel_to_abs(pixel)))
    }

    /// Set `position_transformed` of every record from its adjusted position.
    pub fn transform_tracks(&self, tracks: &mut Tracks) -> Result<()> {
        let mut outside = 0usize;
        for t in 0..tracks.num_frames() {
            for record in tracks.frame_records_mut(t) {
                record.position_transformed = match record.position_adjusted {
                    Some(p) => self.project(&p)?,
                    None => None,
                };
                if record.position_adjusted.is_some() && record.position_transformed.is_none() {
                    outside += 1;
                }
            }
        }
        debug!(outside, "projected positions to ground plane");
        Ok(())
    }
}
