//! Great-circle distance between coordinates, with input validation.

use crate::stations::error::LocateStationError;
use crate::types::lat_lon::LatLon;
use haversine::{distance, Location as HaversineLocation, Units};

/// Mean Earth radius used by the haversine formula, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Fails fast on coordinates that are not finite or outside the WGS84 range.
pub fn validate_coordinate(location: LatLon) -> Result<(), LocateStationError> {
    let LatLon(latitude, longitude) = location;
    if !latitude.is_finite()
        || !longitude.is_finite()
        || !(-90.0..=90.0).contains(&latitude)
        || !(-180.0..=180.0).contains(&longitude)
    {
        return Err(LocateStationError::InvalidCoordinate {
            latitude,
            longitude,
        });
    }
    Ok(())
}

pub fn validate_radius(radius_km: f64) -> Result<(), LocateStationError> {
    if !radius_km.is_finite() || radius_km < 0.0 {
        return Err(LocateStationError::InvalidRadius(radius_km));
    }
    Ok(())
}

/// Haversine distance in kilometers. Inputs are assumed valid.
pub fn haversine_km(from: LatLon, to: LatLon) -> f64 {
    distance(
        HaversineLocation {
            latitude: from.0,
            longitude: from.1,
        },
        HaversineLocation {
            latitude: to.0,
            longitude: to.1,
        },
        Units::Kilometers,
    )
}

/// Haversine distance in kilometers, rejecting invalid coordinates instead of
/// producing a NaN distance.
pub fn checked_distance_km(from: LatLon, to: LatLon) -> Result<f64, LocateStationError> {
    validate_coordinate(from)?;
    validate_coordinate(to)?;
    Ok(haversine_km(from, to))
}

/// Position on the unit sphere, used as the R-tree key.
pub(crate) fn unit_vector(location: LatLon) -> [f64; 3] {
    let lat = location.0.to_radians();
    let lon = location.1.to_radians();
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Straight-line distance through the unit sphere matching a great-circle
/// distance in kilometers. Monotonic in `distance_km`.
pub(crate) fn chord_for_distance(distance_km: f64) -> f64 {
    let angle = (distance_km / EARTH_RADIUS_KM).min(std::f64::consts::PI);
    2.0 * (angle / 2.0).sin()
}
