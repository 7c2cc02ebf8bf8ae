//! Greedy detection-to-object assignment.

use nalgebra::DMatrix;

/// Pair detections with objects, cheapest first.
///
/// `distance_matrix` is (n_detections x n_objects). Pairs above `threshold`
/// and non-finite entries are never matched. Each detection and each object
/// appears in at most one returned `(detection, object)` pair, in the order
/// they were accepted.
pub fn match_detections_and_objects(distance_matrix: &DMatrix<f64>, threshold: f64) -> Vec<(usize, usize)> {
    let (n_detections, n_objects) = distance_matrix.shape();

    let mut candidates: Vec<(f64, usize, usize)> = (0..n_detections)
        .flat_map(|i| (0..n_objects).map(move |j| (i, j)))
        .map(|(i, j)| (distance_matrix[(i, j)], i, j))
        .filter(|(d, _, _)| d.is_finite() && *d <= threshold)
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut used_dets = vec![false; n_detections];
    let mut used_objs = vec![false; n_objects];
    let mut pairs = Vec::with_capacity(n_detections.min(n_objects));

    for (_, det, obj) in candidates {
        if used_dets[det] || used_objs[obj] {
            continue;
        }
        used_dets[det] = true;
        used_objs[obj] = true;
        pairs.push((det, obj));
    }

    pairs
}

/// Indices in `0..total` that are not in `matched`.
pub fn get_unmatched(total: usize, matched: impl IntoIterator<Item = usize>) -> Vec<usize> {
    let mut is_matched = vec![false; total];
    for idx in matched {
        is_matched[idx] = true;
    }
    (0..total).filter(|&i| !is_matched[i]).collect()
}
