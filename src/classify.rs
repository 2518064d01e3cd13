//! Feature classification.
//!
//! One order-preserving pass over the input splits the features into the
//! pieces the synthesizer needs:
//!
//! - the walking path: every `LineString` concatenated in input order
//! - a floor map: path coordinates of features that declare a `floor`
//! - a transport map: point features whose `travelType` is a lift, stairs,
//!   escalator or ramp
//! - the start (`"from"`) and end (`"to"`) endpoints
//!
//! A feature may contribute to several of these at once.

use log::{debug, info, warn};

use crate::error::{GuidanceError, Result};
use crate::features::{EndpointKind, Feature, Geometry, TransportKind};
use crate::spatial_index::CoordinateIndex;
use crate::Coordinate;

/// A vertical transport placed on the path.
#[derive(Debug, Clone, PartialEq)]
pub struct Transport {
    pub kind: TransportKind,
    /// Free-form direction from upstream, e.g. "up" or "down"
    pub direction: Option<String>,
    pub source_floor: Option<i32>,
    pub destination_floor: i32,
}

/// The origin or destination of the path.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub kind: EndpointKind,
    pub location: Coordinate,
    pub floor: Option<i32>,
    pub label: Option<String>,
}

pub type FloorMap = CoordinateIndex<i32>;
pub type TransportMap = CoordinateIndex<Transport>;

/// Everything the synthesizer consumes, split out of the raw features.
#[derive(Debug, Clone)]
pub struct ClassifiedRoute {
    /// All path coordinates in input order, neither deduplicated nor re-ordered
    pub path: Vec<Coordinate>,
    pub floors: FloorMap,
    pub transports: TransportMap,
    pub start: Endpoint,
    pub end: Endpoint,
}

/// Classify features into path, side maps and endpoints.
///
/// Fails when either endpoint is missing, declared twice, or has no usable
/// location. Transport features that cannot be placed (no point geometry, no
/// destination floor) are skipped with a warning.
///
/// # Example
///
/// ```rust
/// use transfer_guide::classify::classify;
/// use transfer_guide::features::FeatureCollection;
///
/// let collection = FeatureCollection::from_json(r#"{"features": [
///     {"geometry": {"type": "Point", "coordinates": [8.540, 47.378]},
///      "properties": {"endpointType": "from", "floor": 0, "label": "Track 31"}},
///     {"geometry": {"type": "LineString", "coordinates": [[8.540, 47.378], [8.541, 47.378]]},
///      "properties": {"floor": 0}},
///     {"geometry": {"type": "Point", "coordinates": [8.541, 47.378]},
///      "properties": {"endpointType": "to", "floor": 0, "label": "Track 18"}}
/// ]}"#).unwrap();
///
/// let route = classify(&collection.features).unwrap();
/// assert_eq!(route.path.len(), 2);
/// assert_eq!(route.floors.len(), 2);
/// assert_eq!(route.start.label.as_deref(), Some("Track 31"));
/// ```
pub fn classify(features: &[Feature]) -> Result<ClassifiedRoute> {
    let mut path = Vec::new();
    let mut floors = FloorMap::new();
    let mut transports = TransportMap::new();
    let mut start: Option<Endpoint> = None;
    let mut end: Option<Endpoint> = None;

    for (i, feature) in features.iter().enumerate() {
        let props = &feature.properties;

        match &feature.geometry {
            Some(Geometry::LineString(coords)) => {
                path.extend_from_slice(coords);
                if let Some(floor) = props.floor {
                    for coord in coords {
                        floors.insert(*coord, floor);
                    }
                }
            }
            Some(Geometry::Other(kind)) => debug!("Feature {}: {} geometry is not part of the path", i, kind),
            _ => {}
        }

        if let Some(travel_type) = props.travel_type.as_deref() {
            match props.transport_kind() {
                Some(kind) => {
                    if let Some((location, transport)) = transport_from(i, feature, kind) {
                        transports.insert(location, transport);
                    }
                }
                None => debug!("Feature {}: travelType {:?} is not vertical transport", i, travel_type),
            }
        }

        if let Some(kind) = props.endpoint_kind() {
            let endpoint = endpoint_from(feature, kind)?;
            let slot = match kind {
                EndpointKind::From => &mut start,
                EndpointKind::To => &mut end,
            };
            if slot.is_some() {
                return Err(GuidanceError::DuplicateEndpoint(kind));
            }
            *slot = Some(endpoint);
        }
    }

    let start = start.ok_or(GuidanceError::MissingEndpoint(EndpointKind::From))?;
    let end = end.ok_or(GuidanceError::MissingEndpoint(EndpointKind::To))?;

    info!(
        "Classified {} features: {} path points, {} floor marks, {} transports",
        features.len(),
        path.len(),
        floors.len(),
        transports.len()
    );

    Ok(ClassifiedRoute { path, floors, transports, start, end })
}

fn transport_from(index: usize, feature: &Feature, kind: TransportKind) -> Option<(Coordinate, Transport)> {
    let props = &feature.properties;

    let Some(location) = feature.geometry.as_ref().and_then(Geometry::point) else {
        warn!("Feature {}: {} without a point geometry, ignoring", index, kind);
        return None;
    };
    let Some(destination_floor) = props.destination_floor else {
        warn!("Feature {}: {} without a destination floor, ignoring", index, kind);
        return None;
    };

    Some((
        location,
        Transport {
            kind,
            direction: props.direction.clone(),
            source_floor: props.source_floor,
            destination_floor,
        },
    ))
}

/// Endpoints are usually points. A line endpoint is located at its first
/// vertex for the start and its last vertex for the destination.
fn endpoint_from(feature: &Feature, kind: EndpointKind) -> Result<Endpoint> {
    let location = match (&feature.geometry, kind) {
        (Some(Geometry::Point(point)), _) => Some(*point),
        (Some(Geometry::LineString(coords)), EndpointKind::From) => coords.first().copied(),
        (Some(Geometry::LineString(coords)), EndpointKind::To) => coords.last().copied(),
        _ => None,
    }
    .ok_or(GuidanceError::EndpointWithoutLocation(kind))?;

    Ok(Endpoint {
        kind,
        location,
        floor: feature.properties.floor,
        label: feature.properties.label.clone(),
    })
}
