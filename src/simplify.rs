//! Douglas-Peucker path simplification.
//!
//! Reduces a dense walking path to the vertices that carry its shape: every
//! dropped point lies within `tolerance` (in coordinate degrees) of the chord
//! that replaces it, measured with [`perpendicular_distance`].
//!
//! The classic formulation recurses on both halves of every split. Here the
//! sub-ranges are kept on an explicit work stack and kept vertices are marked
//! in place, so path length never turns into call-stack depth.

use crate::geo_utils::perpendicular_distance;
use crate::Coordinate;

/// Default simplification tolerance in degrees (roughly 5 meters of latitude).
pub const DEFAULT_TOLERANCE: f64 = 0.00005;

/// Simplify a path with the Douglas-Peucker algorithm.
///
/// The first and last points are always kept and the output is a subsequence
/// of the input in the original order. Inputs with two or fewer points are
/// returned unchanged.
///
/// # Example
///
/// ```rust
/// use transfer_guide::{Coordinate, simplify::douglas_peucker};
///
/// let path = vec![
///     Coordinate::new(8.5400, 47.3780),
///     Coordinate::new(8.5405, 47.3780),
///     Coordinate::new(8.5410, 47.3780),
///     Coordinate::new(8.5410, 47.3790),
/// ];
///
/// let simplified = douglas_peucker(&path, 0.00005);
/// assert_eq!(simplified, vec![path[0], path[2], path[3]]);
/// ```
pub fn douglas_peucker(points: &[Coordinate], tolerance: f64) -> Vec<Coordinate> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut pending = vec![(0usize, last)];

    while let Some((first, end)) = pending.pop() {
        if end - first < 2 {
            continue;
        }

        let (max_index, max_distance) = farthest_from_chord(points, first, end);

        if max_distance > tolerance {
            keep[max_index] = true;
            pending.push((max_index, end));
            pending.push((first, max_index));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(point, kept)| kept.then_some(*point))
        .collect()
}

/// Index and distance of the interior point farthest from the chord
/// `points[first] -> points[end]`. Ties keep the earliest index.
fn farthest_from_chord(points: &[Coordinate], first: usize, end: usize) -> (usize, f64) {
    let start = &points[first];
    let finish = &points[end];

    let mut max_distance = 0.0;
    let mut max_index = first;

    for (i, point) in points.iter().enumerate().take(end).skip(first + 1) {
        let distance = perpendicular_distance(point, start, finish);
        if distance > max_distance {
            max_distance = distance;
            max_index = i;
        }
    }

    (max_index, max_distance)
}
