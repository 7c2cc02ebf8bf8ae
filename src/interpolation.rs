//! Ball trajectory gap filling.

use tracing::debug;

use crate::track::{FrameRecords, TrackRecord};
use crate::tracker::BALL_ID;
use crate::utils::BBox;

/// Fill missing entries of a box series.
///
/// Gaps between two observations are interpolated linearly per coordinate.
/// A leading gap takes the first observation and a trailing gap the last.
/// A series with no observation stays empty.
pub fn interpolate_boxes(series: &[Option<BBox>]) -> Vec<Option<BBox>> {
    let observed: Vec<(usize, BBox)> = series
        .iter()
        .enumerate()
        .filter_map(|(t, b)| b.map(|b| (t, b)))
        .collect();

    let (Some(&(first_t, first)), Some(&(last_t, last))) = (observed.first(), observed.last()) else {
        return vec![None; series.len()];
    };

    let mut filled = vec![None; series.len()];
    for t in 0..first_t {
        filled[t] = Some(first);
    }
    for pair in observed.windows(2) {
        let ((t0, b0), (t1, b1)) = (pair[0], pair[1]);
        let span = (t1 - t0) as f64;
        for t in t0..t1 {
            let alpha = (t - t0) as f64 / span;
            filled[t] = Some(lerp(&b0, &b1, alpha));
        }
    }
    for slot in filled.iter_mut().skip(last_t) {
        *slot = Some(last);
    }
    filled
}

fn lerp(a: &BBox, b: &BBox, alpha: f64) -> BBox {
    let (a, b) = (a.as_array(), b.as_array());
    let v: [f64; 4] = std::array::from_fn(|i| a[i] + (b[i] - a[i]) * alpha);
    BBox::from(v)
}

/// Interpolate the ball track, one record under the ball identity per frame.
///
/// Only boxes survive: derived fields are recomputed by later stages.
pub fn interpolate_ball_positions(ball: &[FrameRecords]) -> Vec<FrameRecords> {
    let series: Vec<Option<BBox>> = ball
        .iter()
        .map(|frame| frame.get(&BALL_ID).map(|record| record.bbox))
        .collect();
    let missing = series.iter().filter(|b| b.is_none()).count();

    let filled = interpolate_boxes(&series);
    debug!(frames = series.len(), missing, "interpolated ball track");

    filled
        .into_iter()
        .map(|bbox| {
            bbox.map(|b| (BALL_ID, TrackRecord::new(b)))
                .into_iter()
                .collect()
        })
        .collect()
}
