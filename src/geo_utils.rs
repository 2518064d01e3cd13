//! # Geographic Utilities
//!
//! Geometry primitives used by the simplifier and the instruction synthesizer.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two coordinates |
//! | [`polyline_length`] | Total length of a path in meters |
//! | [`turn_angle_degrees`] | Unsigned heading change at a vertex, 0..=180 |
//! | [`signed_turn_angle_degrees`] | Heading change signed by turn side |
//! | [`perpendicular_distance`] | Simplification error metric |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//!
//! ## Example
//!
//! ```rust
//! use transfer_guide::{Coordinate, geo_utils};
//!
//! let a = Coordinate::new(8.5400, 47.3780);
//! let b = Coordinate::new(8.5410, 47.3780);
//! let c = Coordinate::new(8.5410, 47.3770);
//!
//! // Heading east, then south: a right turn
//! let angle = geo_utils::signed_turn_angle_degrees(&a, &b, &c);
//! assert!((angle - 90.0).abs() < 1e-9);
//!
//! let length = geo_utils::polyline_length(&[a, b, c]);
//! println!("Path length: {:.0}m", length);
//! ```
//!
//! ## Coordinate System
//!
//! Coordinates are WGS84 degrees in GeoJSON axis order (longitude, latitude).
//! Distances are geodesic; angles and the simplification metric work on the
//! raw degree components, treating longitude as x (east) and latitude as y
//! (north).

use geo::{Distance, Haversine, Point};
use crate::Coordinate;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two coordinates using the Haversine formula.
///
/// Returns meters along the Earth's surface (spherical Earth, radius 6,371 km).
///
/// # Example
///
/// ```rust
/// use transfer_guide::{Coordinate, geo_utils};
///
/// let zurich = Coordinate::new(8.5402, 47.3782);
/// let bern = Coordinate::new(7.4391, 46.9490);
///
/// let distance = geo_utils::haversine_distance(&zurich, &bern);
/// assert!((distance - 95_500.0).abs() < 2_000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &Coordinate, p2: &Coordinate) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Total length of a path in meters.
///
/// Sums the haversine distance between consecutive points. Empty or single-point
/// paths return 0.0.
pub fn polyline_length(points: &[Coordinate]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Convert meters to approximate degrees at a given latitude.
///
/// Uses the longitude scale at `latitude`, which is never smaller than the
/// latitude scale, so the result is a conservative (larger) search radius for
/// both axes at every latitude. It grows without bound towards the poles.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = 111_320.0 * lat_rad.cos().abs().max(f64::EPSILON);
    meters / meters_per_degree
}

// =============================================================================
// Angle Functions
// =============================================================================

/// Heading change at `curr` when walking `prev -> curr -> next`, in degrees.
///
/// Computed from the dot product of the two segment vectors. The cosine is
/// clamped to `[-1, 1]` before `acos`, so the result is always in `0..=180`.
/// Returns 0 when either segment has zero length.
///
/// # Example
///
/// ```rust
/// use transfer_guide::{Coordinate, geo_utils};
///
/// let a = Coordinate::new(0.0, 0.0);
/// let b = Coordinate::new(1.0, 0.0);
/// let c = Coordinate::new(2.0, 0.0);
/// assert_eq!(geo_utils::turn_angle_degrees(&a, &b, &c), 0.0);
///
/// // Coincident points never divide by zero
/// assert_eq!(geo_utils::turn_angle_degrees(&a, &a, &c), 0.0);
/// ```
pub fn turn_angle_degrees(prev: &Coordinate, curr: &Coordinate, next: &Coordinate) -> f64 {
    let (v1x, v1y) = (curr.longitude - prev.longitude, curr.latitude - prev.latitude);
    let (v2x, v2y) = (next.longitude - curr.longitude, next.latitude - curr.latitude);

    let magnitude1 = (v1x * v1x + v1y * v1y).sqrt();
    let magnitude2 = (v2x * v2x + v2y * v2y).sqrt();

    if magnitude1 == 0.0 || magnitude2 == 0.0 {
        return 0.0;
    }

    let cos_angle = ((v1x * v2x + v1y * v2y) / (magnitude1 * magnitude2)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Heading change at `curr`, signed by turn side.
///
/// The magnitude equals [`turn_angle_degrees`]. The sign comes from the 2D
/// cross product of the segment vectors: positive for a clockwise (right)
/// turn, negative for a counter-clockwise (left) turn, zero when straight or
/// degenerate. A full reversal is reported as +180.
pub fn signed_turn_angle_degrees(prev: &Coordinate, curr: &Coordinate, next: &Coordinate) -> f64 {
    let angle = turn_angle_degrees(prev, curr, next);

    let (v1x, v1y) = (curr.longitude - prev.longitude, curr.latitude - prev.latitude);
    let (v2x, v2y) = (next.longitude - curr.longitude, next.latitude - curr.latitude);
    let cross = v1x * v2y - v1y * v2x;

    if cross > 0.0 {
        -angle
    } else {
        angle
    }
}

// =============================================================================
// Simplification Metric
// =============================================================================

/// Distance from `point` to the segment `line_start -> line_end`.
///
/// Planar, in raw coordinate units (degrees), because the simplification
/// tolerance is expressed in degrees. The projection is clamped to the
/// segment, so points beyond either end measure to the nearer endpoint.
///
/// When the segment is degenerate (`line_start == line_end`) this falls back
/// to the geodesic point-to-point distance in meters.
pub fn perpendicular_distance(point: &Coordinate, line_start: &Coordinate, line_end: &Coordinate) -> f64 {
    if line_start == line_end {
        return haversine_distance(point, line_start);
    }

    let dx = line_end.longitude - line_start.longitude;
    let dy = line_end.latitude - line_start.latitude;
    let length_sq = dx * dx + dy * dy;

    let t = (((point.longitude - line_start.longitude) * dx
        + (point.latitude - line_start.latitude) * dy)
        / length_sq)
        .clamp(0.0, 1.0);

    let px = line_start.longitude + t * dx - point.longitude;
    let py = line_start.latitude + t * dy - point.latitude;
    (px * px + py * py).sqrt()
}

// =============================================================================
// Unit Tests
// =============================================================================
