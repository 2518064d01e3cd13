//! Input model: the GeoJSON-style feature collection returned by the transfer API.
//!
//! Decoding is lenient. A feature missing `properties` gets an empty bag, a
//! geometry that cannot be read becomes `None`, and a property value of the
//! wrong JSON type reads as absent. Upstream schemas evolve, so only a
//! document that is not a feature collection at all is rejected.

use log::debug;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::Result;
use crate::Coordinate;

/// A collection of features, as returned by the transfer endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Decode a feature collection from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let collection: Self = serde_json::from_str(json)?;
        debug!("Decoded feature collection with {} features", collection.features.len());
        Ok(collection)
    }

    /// Decode a feature collection from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// One input record: an optional geometry and a bag of optional properties.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Feature {
    #[serde(default, deserialize_with = "lenient_geometry")]
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "lenient_properties")]
    pub properties: Properties,
}

impl Feature {
    pub fn new(geometry: Option<Geometry>, properties: Properties) -> Self {
        Self { geometry, properties }
    }
}

/// The geometry shapes this crate reads.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coordinate),
    LineString(Vec<Coordinate>),
    /// Any other geometry type, kept by name for logging.
    Other(String),
}

impl Geometry {
    /// The single location of a point geometry.
    pub fn point(&self) -> Option<Coordinate> {
        match self {
            Geometry::Point(coordinate) => Some(*coordinate),
            _ => None,
        }
    }

    fn from_value(value: Value) -> Option<Self> {
        let kind = value.get("type")?.as_str()?.to_string();
        let coordinates = value.get("coordinates");

        match kind.as_str() {
            "Point" => coordinates.and_then(coordinate_from_value).map(Geometry::Point),
            "LineString" => coordinates
                .and_then(Value::as_array)
                .and_then(|items| items.iter().map(coordinate_from_value).collect::<Option<Vec<_>>>())
                .map(Geometry::LineString),
            _ => Some(Geometry::Other(kind)),
        }
    }
}

/// A position is `[longitude, latitude]`, optionally followed by altitude.
fn coordinate_from_value(value: &Value) -> Option<Coordinate> {
    let items = value.as_array()?;
    if items.len() < 2 {
        return None;
    }
    Some(Coordinate::new(items[0].as_f64()?, items[1].as_f64()?))
}

/// The property bag of a feature. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Properties {
    #[serde(default, deserialize_with = "lenient")]
    pub floor: Option<i32>,
    #[serde(default, deserialize_with = "lenient")]
    pub travel_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub direction: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub source_floor: Option<i32>,
    #[serde(default, deserialize_with = "lenient")]
    pub destination_floor: Option<i32>,
    #[serde(default, deserialize_with = "lenient")]
    pub endpoint_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub label: Option<String>,
}

impl Properties {
    /// The vertical-transport kind, if `travelType` names one.
    pub fn transport_kind(&self) -> Option<TransportKind> {
        self.travel_type.as_deref().and_then(TransportKind::parse)
    }

    /// Which endpoint this feature marks, if any.
    pub fn endpoint_kind(&self) -> Option<EndpointKind> {
        match self.endpoint_type.as_deref() {
            Some("from") => Some(EndpointKind::From),
            Some("to") => Some(EndpointKind::To),
            _ => None,
        }
    }
}

/// Vertical transport connecting two floors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Lift,
    Stairs,
    Escalator,
    Ramp,
}

impl TransportKind {
    /// Parse the upstream `travelType` value. Unknown values yield `None`.
    pub fn parse(travel_type: &str) -> Option<Self> {
        match travel_type {
            "LIFT" => Some(TransportKind::Lift),
            "STAIRS" => Some(TransportKind::Stairs),
            "ESCALATOR" => Some(TransportKind::Escalator),
            "RAMP" => Some(TransportKind::Ramp),
            _ => None,
        }
    }

    /// Lowercase name used in instruction text.
    pub fn name(&self) -> &'static str {
        match self {
            TransportKind::Lift => "lift",
            TransportKind::Stairs => "stairs",
            TransportKind::Escalator => "escalator",
            TransportKind::Ramp => "ramp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The origin or destination of the overall path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    From,
    To,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKind::From => f.write_str("start (\"from\")"),
            EndpointKind::To => f.write_str("destination (\"to\")"),
        }
    }
}

// =============================================================================
// Lenient deserializers
// =============================================================================

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_geometry<'de, D>(deserializer: D) -> std::result::Result<Option<Geometry>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Geometry::from_value(value))
}

fn lenient_properties<'de, D>(deserializer: D) -> std::result::Result<Properties, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuidanceError;
    use serde_json::json;

    #[test]
    fn test_decode_line_string_feature() {
        let feature: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [[8.54, 47.37], [8.55, 47.38, 410.0]]},
            "properties": {"floor": -1, "label": null}
        }))
        .unwrap();

        assert_eq!(
            feature.geometry,
            Some(Geometry::LineString(vec![Coordinate::new(8.54, 47.37), Coordinate::new(8.55, 47.38)]))
        );
        assert_eq!(feature.properties.floor, Some(-1));
        assert_eq!(feature.properties.label, None);
    }

    #[test]
    fn test_decode_transport_feature() {
        let feature: Feature = serde_json::from_value(json!({
            "geometry": {"type": "Point", "coordinates": [8.54, 47.37]},
            "properties": {
                "travelType": "ESCALATOR",
                "direction": "up",
                "sourceFloor": 0,
                "destinationFloor": 1
            }
        }))
        .unwrap();

        assert_eq!(feature.geometry.as_ref().and_then(Geometry::point), Some(Coordinate::new(8.54, 47.37)));
        assert_eq!(feature.properties.transport_kind(), Some(TransportKind::Escalator));
        assert_eq!(feature.properties.direction.as_deref(), Some("up"));
        assert_eq!(feature.properties.destination_floor, Some(1));
    }

    #[test]
    fn test_missing_geometry_and_properties() {
        let feature: Feature = serde_json::from_value(json!({"type": "Feature"})).unwrap();
        assert_eq!(feature.geometry, None);
        assert_eq!(feature.properties, Properties::default());
    }

    #[test]
    fn test_malformed_values_read_as_absent() {
        let feature: Feature = serde_json::from_value(json!({
            "geometry": {"type": "LineString", "coordinates": [[8.54], "oops"]},
            "properties": {"floor": "second", "sourceFloor": 1.5, "endpointType": 7}
        }))
        .unwrap();

        assert_eq!(feature.geometry, None);
        assert_eq!(feature.properties.floor, None);
        assert_eq!(feature.properties.source_floor, None);
        assert_eq!(feature.properties.endpoint_kind(), None);
    }

    #[test]
    fn test_non_object_properties_become_empty() {
        let feature: Feature = serde_json::from_value(json!({
            "geometry": null,
            "properties": "nope"
        }))
        .unwrap();
        assert_eq!(feature.properties, Properties::default());
    }

    #[test]
    fn test_other_geometry_kept_by_name() {
        let feature: Feature = serde_json::from_value(json!({
            "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [0, 1], [0, 0]]]}
        }))
        .unwrap();
        assert_eq!(feature.geometry, Some(Geometry::Other("Polygon".to_string())));
    }

    #[test]
    fn test_unknown_travel_type() {
        let properties = Properties {
            travel_type: Some("TELEPORTER".to_string()),
            ..Default::default()
        };
        assert_eq!(properties.transport_kind(), None);
    }

    #[test]
    fn test_collection_from_json() {
        let collection = FeatureCollection::from_json(
            r#"{"type": "FeatureCollection", "features": [{"properties": {"endpointType": "to"}}]}"#,
        )
        .unwrap();
        assert_eq!(collection.features.len(), 1);
        assert_eq!(collection.features[0].properties.endpoint_kind(), Some(EndpointKind::To));
    }

    #[test]
    fn test_collection_rejects_garbage() {
        let err = FeatureCollection::from_json("[1, 2, 3").unwrap_err();
        assert!(matches!(err, GuidanceError::InvalidInput(_)));
    }
}
