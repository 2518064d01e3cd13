//! # Transfer Guide
//!
//! Turn-by-turn walking directions for transfers inside railway stations.
//!
//! A transfer routing service answers "how do I get from track 31 to track 18"
//! with a GeoJSON feature collection: walkway segments, vertical transport
//! (lifts, stairs, escalators, ramps) and the two endpoints. This library
//! turns that collection into a short, ordered list of sentences a traveller
//! can follow.
//!
//! | Stage | Module | What it does |
//! |-------|--------|--------------|
//! | Decode | [`features`] | Lenient GeoJSON decoding |
//! | Classify | [`classify`] | Path, floor map, transport map, endpoints |
//! | Simplify | [`simplify`] | Douglas-Peucker over the walking path |
//! | Narrate | [`instructions`] | Segment-by-segment state machine |
//!
//! ## Features
//!
//! - **`parallel`** - Plan many transfers at once with rayon
//! - **`http`** - Fetch transfers from the journey-maps API
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use transfer_guide::{plan_directions, FeatureCollection, GuidanceConfig};
//!
//! let collection = FeatureCollection::from_json(r#"{"features": [
//!     {"geometry": {"type": "Point", "coordinates": [8.5400, 47.3780]},
//!      "properties": {"endpointType": "from", "floor": 0, "label": "Track 31"}},
//!     {"geometry": {"type": "LineString",
//!                   "coordinates": [[8.5400, 47.3780], [8.5410, 47.3780], [8.5410, 47.3785]]},
//!      "properties": {"floor": 0}},
//!     {"geometry": {"type": "Point", "coordinates": [8.5410, 47.3785]},
//!      "properties": {"endpointType": "to", "floor": 0, "label": "Track 18"}}
//! ]}"#).unwrap();
//!
//! let directions = plan_directions(&collection.features, &GuidanceConfig::default()).unwrap();
//! for line in directions.lines() {
//!     println!("{}", line);
//! }
//! assert_eq!(directions.lines()[0], "You are at Track 31 on floor 0.");
//! ```

use log::{info, warn};
use serde::{Deserialize, Serialize};

pub mod classify;
pub mod error;
pub mod features;
pub mod geo_utils;
pub mod instructions;
pub mod simplify;
pub mod spatial_index;
pub mod stations;

pub use classify::{classify, ClassifiedRoute, Endpoint, Transport};
pub use error::{GuidanceError, Result};
pub use features::{EndpointKind, Feature, FeatureCollection, Geometry, Properties, TransportKind};
pub use instructions::{Directions, Instruction, Side, TransportMatchPolicy, Turn};
pub use spatial_index::CoordinateIndex;
pub use stations::{Station, StationIndex};

// HTTP module for fetching transfers
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{FetchError, TransferClient, TransferClientConfig, TransferError, TransferRequest};

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 position, longitude first as in GeoJSON.
///
/// # Example
/// ```
/// use transfer_guide::Coordinate;
/// let zurich_hb = Coordinate::new(8.5402, 47.3782);
/// assert!(zurich_hb.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }

    /// Check if the coordinate is finite and within WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Configuration for direction synthesis.
///
/// Every field has a default, so a host can deserialize partial overrides:
///
/// ```
/// use transfer_guide::GuidanceConfig;
///
/// let config: GuidanceConfig = serde_json::from_str(r#"{"transport_match_radius_meters": 2.0}"#).unwrap();
/// assert_eq!(config.transport_match_radius_meters, 2.0);
/// assert_eq!(config.straight_threshold_degrees, 20.0);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    /// Tolerance for Douglas-Peucker simplification (in degrees).
    /// Default: 0.00005 (~5.5 meters)
    pub simplification_tolerance: f64,

    /// Turns below this angle read as "Continue straight".
    /// Default: 20.0 degrees
    pub straight_threshold_degrees: f64,

    /// Turns below this angle (and at or above the straight threshold) are slight.
    /// Default: 60.0 degrees
    pub slight_turn_threshold_degrees: f64,

    /// Turns at or above this angle are sharp.
    /// Default: 120.0 degrees
    pub sharp_turn_threshold_degrees: f64,

    /// How far a floor mark may sit from a path vertex and still apply.
    /// Default: 0.5 meters
    pub floor_match_radius_meters: f64,

    /// How far a vertical transport may sit from a path vertex and still apply.
    /// Default: 5.0 meters
    pub transport_match_radius_meters: f64,

    /// Where transport is looked for along each segment.
    pub transport_policy: TransportMatchPolicy,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            simplification_tolerance: simplify::DEFAULT_TOLERANCE,
            straight_threshold_degrees: 20.0,
            slight_turn_threshold_degrees: 60.0,
            sharp_turn_threshold_degrees: 120.0,
            floor_match_radius_meters: 0.5,
            transport_match_radius_meters: 5.0,
            transport_policy: TransportMatchPolicy::default(),
        }
    }
}

// ============================================================================
// Planning
// ============================================================================

/// Plan directions for one transfer.
///
/// Classifies the features, drops path points outside WGS84 bounds,
/// simplifies the walking path and narrates it.
///
/// Fails only when an endpoint is missing, duplicated or unlocatable.
pub fn plan_directions(features: &[Feature], config: &GuidanceConfig) -> Result<Directions> {
    let route = classify::classify(features)?;

    let valid: Vec<Coordinate> = route.path.iter().copied().filter(Coordinate::is_valid).collect();
    if valid.len() != route.path.len() {
        warn!("Dropped {} path points outside WGS84 bounds", route.path.len() - valid.len());
    }

    let simplified = simplify::douglas_peucker(&valid, config.simplification_tolerance);
    info!(
        "Simplified path from {} to {} points (tolerance {})",
        valid.len(),
        simplified.len(),
        config.simplification_tolerance
    );

    Ok(instructions::synthesize(&simplified, &route, config))
}

/// Plan directions and render them as text, one sentence per line.
///
/// # Example
/// ```
/// use transfer_guide::{generate_instructions, GuidanceConfig, GuidanceError, EndpointKind};
///
/// let err = generate_instructions(&[], &GuidanceConfig::default()).unwrap_err();
/// assert_eq!(err, GuidanceError::MissingEndpoint(EndpointKind::From));
/// ```
pub fn generate_instructions(features: &[Feature], config: &GuidanceConfig) -> Result<Vec<String>> {
    plan_directions(features, config).map(|directions| directions.lines())
}

/// Plan directions for many transfers, one result per collection, in input order.
#[cfg(feature = "parallel")]
pub fn generate_directions_batch(
    collections: &[FeatureCollection],
    config: &GuidanceConfig,
) -> Vec<Result<Directions>> {
    use rayon::prelude::*;

    info!("Planning {} transfers in parallel", collections.len());
    collections
        .par_iter()
        .map(|collection| plan_directions(&collection.features, config))
        .collect()
}

/// Plan directions for many transfers, one result per collection, in input order.
#[cfg(not(feature = "parallel"))]
pub fn generate_directions_batch(
    collections: &[FeatureCollection],
    config: &GuidanceConfig,
) -> Vec<Result<Directions>> {
    info!("Planning {} transfers sequentially", collections.len());
    collections
        .iter()
        .map(|collection| plan_directions(&collection.features, config))
        .collect()
}
