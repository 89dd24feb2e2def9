//! The station lookup interface and its full-scan, in-memory variant.

use crate::stations::distance::{haversine_km, validate_coordinate, validate_radius};
use crate::stations::error::LocateStationError;
use crate::types::lat_lon::LatLon;
use crate::types::station::StationRecord;
use ordered_float::OrderedFloat;

/// Coordinate based access to a collection of stations.
///
/// Implementations hold their records immutably, so queries can run
/// concurrently from several threads.
pub trait StationStore: Send + Sync {
    /// All records, in store order.
    fn stations(&self) -> &[StationRecord];

    /// The record with the smallest great-circle distance to `location`, or
    /// `None` if the store is empty. When several records share the minimum
    /// distance, which one is returned is not meaningful.
    fn fetch_closest(&self, location: LatLon)
        -> Result<Option<StationRecord>, LocateStationError>;

    /// Every record whose great-circle distance to `location` is at most
    /// `radius_km` (inclusive). The order of the result is unspecified.
    fn fetch_within_radius(
        &self,
        location: LatLon,
        radius_km: f64,
    ) -> Result<Vec<StationRecord>, LocateStationError>;

    fn len(&self) -> usize {
        self.stations().len()
    }

    fn is_empty(&self) -> bool {
        self.stations().is_empty()
    }

    /// Up to `n` records with their distance in kilometers, closest first.
    fn nearest(
        &self,
        location: LatLon,
        n: usize,
    ) -> Result<Vec<(StationRecord, f64)>, LocateStationError> {
        validate_coordinate(location)?;
        let mut with_distance: Vec<(&StationRecord, f64)> = self
            .stations()
            .iter()
            .map(|s| (s, haversine_km(location, s.location())))
            .collect();
        with_distance.sort_by_key(|(_, d)| OrderedFloat(*d));
        Ok(with_distance
            .into_iter()
            .take(n)
            .map(|(s, d)| (s.clone(), d))
            .collect())
    }
}

/// Validates the coordinates of every record before it enters a store.
pub(crate) fn validate_stations(stations: &[StationRecord]) -> Result<(), LocateStationError> {
    for station in stations {
        if validate_coordinate(station.location()).is_err() {
            return Err(LocateStationError::InvalidStation {
                id: station.id.clone(),
                latitude: station.latitude,
                longitude: station.longitude,
            });
        }
    }
    Ok(())
}

/// A station store that answers every query with a full scan.
///
/// Each query is O(n) in the number of stations, which is fine for the
/// hundreds to low thousands of stations a weather file collection holds.
/// Use [`crate::DocumentStore`] for an indexed store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStations {
    stations: Vec<StationRecord>,
}

impl InMemoryStations {
    pub fn new(stations: Vec<StationRecord>) -> Result<Self, LocateStationError> {
        validate_stations(&stations)?;
        Ok(Self { stations })
    }
}

impl StationStore for InMemoryStations {
    fn stations(&self) -> &[StationRecord] {
        &self.stations
    }

    fn fetch_closest(
        &self,
        location: LatLon,
    ) -> Result<Option<StationRecord>, LocateStationError> {
        validate_coordinate(location)?;
        let mut closest: Option<(&StationRecord, f64)> = None;
        for station in &self.stations {
            let dist_km = haversine_km(location, station.location());
            // Strict comparison keeps the first record on ties.
            if closest.map_or(true, |(_, best)| dist_km < best) {
                closest = Some((station, dist_km));
            }
        }
        Ok(closest.map(|(station, _)| station.clone()))
    }

    fn fetch_within_radius(
        &self,
        location: LatLon,
        radius_km: f64,
    ) -> Result<Vec<StationRecord>, LocateStationError> {
        validate_coordinate(location)?;
        validate_radius(radius_km)?;
        Ok(self
            .stations
            .iter()
            .filter(|s| haversine_km(location, s.location()) <= radius_km)
            .cloned()
            .collect())
    }
}
