use crate::archive::error::{ArchiveError, ParseError};
use crate::comfort::error::CategoryError;
use crate::stations::error::LocateStationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComfortError {
    #[error(transparent)]
    LocateStation(#[from] LocateStationError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Category(#[from] CategoryError),

    #[error("Failed to get weather data for station '{station}'")]
    Station {
        station: String,
        #[source]
        source: ArchiveError,
    },

    #[error("No station found within {radius_km} km of ({latitude}, {longitude})")]
    NoStationWithinRadius {
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    },

    #[error("No station found near ({latitude}, {longitude}): the station store is empty")]
    NoStations { latitude: f64, longitude: f64 },

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),
}
