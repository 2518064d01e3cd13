//! Station lookup.
//!
//! The transfer API identifies stations by their operating-point number. The
//! operator publishes the full list as a JSON array of loosely shaped records;
//! [`StationIndex`] keeps the two fields needed to pick a station by name and
//! skips everything else.

use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;

use crate::error::{GuidanceError, Result};

const ID_FIELD: &str = "operatingpointkilometermasternumber";
const NAME_FIELD: &str = "designationofficial";

/// A station that can be used as the origin and destination of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Station {
    pub id: String,
    pub name: String,
}

impl Station {
    fn from_record(record: &Value) -> Option<Self> {
        let id = match record.get(ID_FIELD)? {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        let name = record.get(NAME_FIELD)?.as_str()?.to_string();
        Some(Self { id, name })
    }
}

/// Immutable list of stations, searchable by name.
#[derive(Debug, Clone, Default)]
pub struct StationIndex {
    stations: Vec<Station>,
    by_id: HashMap<String, usize>,
}

impl StationIndex {
    /// Build an index from stations, keeping their order. A repeated id
    /// resolves to its first occurrence in [`get`](Self::get).
    pub fn new(stations: Vec<Station>) -> Self {
        let mut by_id = HashMap::with_capacity(stations.len());
        for (i, station) in stations.iter().enumerate() {
            by_id.entry(station.id.clone()).or_insert(i);
        }
        Self { stations, by_id }
    }

    /// Load the operator's stations document.
    ///
    /// Records lacking an id or an official name are skipped.
    ///
    /// # Example
    /// ```
    /// use transfer_guide::StationIndex;
    ///
    /// let index = StationIndex::from_json(r#"[
    ///     {"operatingpointkilometermasternumber": 8503000, "designationofficial": "Zürich HB"},
    ///     {"operatingpointkilometermasternumber": "8507000", "designationofficial": "Bern"},
    ///     {"designationofficial": "No id"}
    /// ]"#).unwrap();
    ///
    /// assert_eq!(index.len(), 2);
    /// assert_eq!(index.get("8503000").map(|s| s.name.as_str()), Some("Zürich HB"));
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_records(serde_json::from_str(json)?)
    }

    /// Load the operator's stations document from a reader, e.g. an open file.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_records(serde_json::from_reader(reader)?)
    }

    fn from_records(document: Value) -> Result<Self> {
        let Value::Array(records) = document else {
            return Err(GuidanceError::InvalidInput(
                "stations document is not a JSON array".to_string(),
            ));
        };

        let stations: Vec<Station> = records.iter().filter_map(Station::from_record).collect();
        if stations.len() != records.len() {
            debug!("Skipped {} station records without id or name", records.len() - stations.len());
        }
        info!("Loaded {} stations", stations.len());

        Ok(Self::new(stations))
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Look a station up by id.
    pub fn get(&self, id: &str) -> Option<&Station> {
        self.by_id.get(id).map(|&i| &self.stations[i])
    }

    /// Stations whose name contains `query`, ignoring case, in load order.
    /// An empty query matches every station.
    pub fn search(&self, query: &str) -> Vec<&Station> {
        let query = query.to_lowercase();
        self.stations
            .iter()
            .filter(|station| station.name.to_lowercase().contains(&query))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_index() -> StationIndex {
        let document = json!([
            {"operatingpointkilometermasternumber": 8503000, "designationofficial": "Zürich HB", "abbreviation": "ZUE"},
            {"operatingpointkilometermasternumber": "8503003", "designationofficial": "Zürich Stadelhofen"},
            {"operatingpointkilometermasternumber": 8507000, "designationofficial": "Bern"},
            {"operatingpointkilometermasternumber": 8500010},
            {"designationofficial": "Nowhere"},
            {"operatingpointkilometermasternumber": true, "designationofficial": "Bad id"}
        ]);
        StationIndex::from_json(&document.to_string()).unwrap()
    }

    #[test]
    fn test_incomplete_records_skipped() {
        let index = sample_index();
        assert_eq!(index.len(), 3);
        assert!(!index.is_empty());
    }

    #[test]
    fn test_get_by_numeric_and_string_id() {
        let index = sample_index();
        assert_eq!(index.get("8503000").unwrap().name, "Zürich HB");
        assert_eq!(index.get("8503003").unwrap().name, "Zürich Stadelhofen");
        assert!(index.get("8500010").is_none());
    }

    #[test]
    fn test_search_case_insensitive_in_order() {
        let index = sample_index();
        let names: Vec<&str> = index.search("zÜRICH").iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Zürich HB", "Zürich Stadelhofen"]);
        assert_eq!(index.search("bern").len(), 1);
        assert!(index.search("Basel").is_empty());
    }

    #[test]
    fn test_empty_query_matches_all() {
        let index = sample_index();
        assert_eq!(index.search("").len(), index.len());
    }

    #[test]
    fn test_from_reader() {
        let json = br#"[{"operatingpointkilometermasternumber": "8507000", "designationofficial": "Bern"}]"#;
        let index = StationIndex::from_reader(&json[..]).unwrap();
        assert_eq!(index.iter().next().unwrap().id, "8507000");
    }

    #[test]
    fn test_rejects_non_array() {
        let err = StationIndex::from_json(r#"{"stations": []}"#).unwrap_err();
        assert!(matches!(err, GuidanceError::InvalidInput(_)));
    }

    #[test]
    fn test_duplicate_id_resolves_to_first() {
        let index = StationIndex::new(vec![
            Station { id: "1".to_string(), name: "First".to_string() },
            Station { id: "1".to_string(), name: "Second".to_string() },
        ]);
        assert_eq!(index.get("1").unwrap().name, "First");
        assert_eq!(index.len(), 2);
    }
}
