//! Defines the station record returned by station stores, as read from the
//! station document collection.

use crate::types::lat_lon::LatLon;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A single weather station and the location of its EPW archive.
///
/// Records deserialize from the station documents of the store. The short
/// document field names (`_id`, `lat`, `lng`) are accepted as aliases.
///
/// Equality and hashing only look at [`StationRecord::id`]: two records with the
/// same identifier are the same station.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StationRecord {
    /// Stable station identifier (e.g. the WMO number "027240").
    #[serde(alias = "_id")]
    pub id: String,
    /// Human readable station name (e.g. "Lumparland Langnas Harbour").
    pub name: String,
    /// Latitude in decimal degrees (positive for North, negative for South).
    #[serde(alias = "lat")]
    pub latitude: f64,
    /// Longitude in decimal degrees (positive for East, negative for West).
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: f64,
    /// Elevation above sea level in meters, if available.
    #[serde(default)]
    pub elevation: Option<f64>,
    /// Data source label (e.g. "SRC-TMYx").
    #[serde(default)]
    pub source: Option<String>,
    /// Dataset label (e.g. "TMYx").
    #[serde(default)]
    pub dataset: Option<String>,
    /// WMO station number, when the station has one.
    #[serde(default)]
    pub wmo: Option<String>,
    /// Typical-year selection period label (e.g. "2007-2021").
    #[serde(default)]
    pub period: Option<String>,
    /// Period of record the archive was built from (e.g. "2007-2021").
    #[serde(default, alias = "years")]
    pub years_of_record: Option<String>,
    /// Resolvable location of the zipped EPW archive.
    #[serde(alias = "archive_url")]
    pub url: String,
}

impl StationRecord {
    pub fn location(&self) -> LatLon {
        LatLon(self.latitude, self.longitude)
    }
}

impl PartialEq for StationRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StationRecord {}

impl Hash for StationRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
