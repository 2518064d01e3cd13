//! Proximity lookup keyed by coordinate.
//!
//! Floor and transport annotations are attached to coordinates, but upstream
//! data rarely repeats a position bit-for-bit across features describing the
//! same spot. [`CoordinateIndex`] stores values in an R-tree and answers
//! "what is within `radius` meters of here", so a lift a few centimeters off
//! the walking path is still found. A radius of zero degenerates to exact
//! matching.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use std::collections::HashMap;

use crate::geo_utils::{haversine_distance, meters_to_degrees};
use crate::Coordinate;

/// R-tree entry: a position plus the slot of its value.
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    lng: f64,
    lat: f64,
    slot: usize,
}

impl IndexedPoint {
    fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lng, self.lat)
    }
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlng = self.lng - point[0];
        let dlat = self.lat - point[1];
        dlng * dlng + dlat * dlat
    }
}

/// Values attached to coordinates, queried by proximity.
///
/// Inserting at a coordinate that is already present (bit-for-bit) replaces
/// the stored value, so later writes win. When several stored coordinates
/// fall inside a lookup radius the nearest one is returned, and among equally
/// near ones the most recently written.
#[derive(Debug, Clone)]
pub struct CoordinateIndex<T> {
    tree: RTree<IndexedPoint>,
    values: Vec<T>,
    written_at: Vec<u64>,
    slots: HashMap<(u64, u64), usize>,
    writes: u64,
}

impl<T> Default for CoordinateIndex<T> {
    fn default() -> Self {
        Self {
            tree: RTree::new(),
            values: Vec::new(),
            written_at: Vec::new(),
            slots: HashMap::new(),
            writes: 0,
        }
    }
}

impl<T> CoordinateIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `value` to `coordinate`, replacing any value stored at exactly
    /// the same position.
    pub fn insert(&mut self, coordinate: Coordinate, value: T) {
        self.writes += 1;
        let key = (coordinate.longitude.to_bits(), coordinate.latitude.to_bits());

        if let Some(&slot) = self.slots.get(&key) {
            self.values[slot] = value;
            self.written_at[slot] = self.writes;
            return;
        }

        let slot = self.values.len();
        self.values.push(value);
        self.written_at.push(self.writes);
        self.slots.insert(key, slot);
        self.tree.insert(IndexedPoint {
            lng: coordinate.longitude,
            lat: coordinate.latitude,
            slot,
        });
    }

    /// Every value within `radius_meters` of `coordinate`, with the stored
    /// position it was found at. Nearest first; equally near entries put the
    /// most recently written first.
    pub fn all_within(&self, coordinate: &Coordinate, radius_meters: f64) -> Vec<(Coordinate, &T)> {
        let radius_deg = meters_to_degrees(radius_meters.max(0.0), coordinate.latitude);
        let query = [coordinate.longitude, coordinate.latitude];

        let mut hits: Vec<(&IndexedPoint, f64)> = self
            .tree
            .locate_within_distance(query, radius_deg * radius_deg)
            .map(|entry| (entry, haversine_distance(&entry.coordinate(), coordinate)))
            .filter(|(_, distance)| *distance <= radius_meters)
            .collect();
        hits.sort_by(|(a, da), (b, db)| {
            da.total_cmp(db)
                .then_with(|| self.written_at[b.slot].cmp(&self.written_at[a.slot]))
        });

        hits.into_iter()
            .map(|(entry, _)| (entry.coordinate(), &self.values[entry.slot]))
            .collect()
    }

    /// The value nearest to `coordinate` within `radius_meters`, with the
    /// stored position it was found at.
    pub fn nearest_within(&self, coordinate: &Coordinate, radius_meters: f64) -> Option<(Coordinate, &T)> {
        self.all_within(coordinate, radius_meters).into_iter().next()
    }

    /// The value nearest to `coordinate` within `radius_meters`.
    pub fn get_within(&self, coordinate: &Coordinate, radius_meters: f64) -> Option<&T> {
        self.nearest_within(coordinate, radius_meters).map(|(_, value)| value)
    }

    /// Number of distinct coordinates stored.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(longitude: f64, latitude: f64) -> Coordinate {
        Coordinate::new(longitude, latitude)
    }

    #[test]
    fn test_exact_lookup_with_zero_radius() {
        let mut index = CoordinateIndex::new();
        index.insert(c(8.5400, 47.3780), 1);

        assert_eq!(index.get_within(&c(8.5400, 47.3780), 0.0), Some(&1));
        assert_eq!(index.get_within(&c(8.5400001, 47.3780), 0.0), None);
    }

    #[test]
    fn test_last_write_wins() {
        let mut index = CoordinateIndex::new();
        index.insert(c(8.5400, 47.3780), 0);
        index.insert(c(8.5400, 47.3780), 2);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get_within(&c(8.5400, 47.3780), 0.0), Some(&2));
    }

    #[test]
    fn test_tolerant_lookup() {
        let mut index = CoordinateIndex::new();
        // About 1.1 meters north of the query point
        index.insert(c(8.5400, 47.37801), "lift");

        let query = c(8.5400, 47.3780);
        assert_eq!(index.get_within(&query, 0.5), None);
        assert_eq!(index.get_within(&query, 2.0), Some(&"lift"));
    }

    #[test]
    fn test_nearest_wins() {
        let mut index = CoordinateIndex::new();
        index.insert(c(8.54000, 47.37803), "far");
        index.insert(c(8.54000, 47.37801), "near");

        let (position, value) = index.nearest_within(&c(8.5400, 47.3780), 10.0).unwrap();
        assert_eq!(*value, "near");
        assert_eq!(position, c(8.54000, 47.37801));
    }

    #[test]
    fn test_equidistant_prefers_latest() {
        let mut index = CoordinateIndex::new();
        index.insert(c(0.00001, 0.0), "east");
        index.insert(c(-0.00001, 0.0), "west");

        assert_eq!(index.get_within(&c(0.0, 0.0), 5.0), Some(&"west"));
    }

    #[test]
    fn test_all_within_sorted_nearest_first() {
        let mut index = CoordinateIndex::new();
        index.insert(c(0.00003, 0.0), "far");
        index.insert(c(0.00001, 0.0), "east");
        index.insert(c(-0.00001, 0.0), "west");
        index.insert(c(0.001, 0.0), "outside");

        let values: Vec<&str> = index
            .all_within(&c(0.0, 0.0), 5.0)
            .into_iter()
            .map(|(_, value)| *value)
            .collect();
        assert_eq!(values, vec!["west", "east", "far"]);
    }

    #[test]
    fn test_high_latitude_radius() {
        let mut index = CoordinateIndex::new();
        // About 4 meters east at 88 degrees north
        index.insert(c(0.00103, 88.0), "lift");

        assert_eq!(index.get_within(&c(0.0, 88.0), 5.0), Some(&"lift"));
        assert_eq!(index.get_within(&c(0.0, 88.0), 3.0), None);
    }

    #[test]
    fn test_empty_index() {
        let index: CoordinateIndex<i32> = CoordinateIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.get_within(&c(0.0, 0.0), 100.0), None);
    }
}
