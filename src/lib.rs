pub mod archive;
pub mod comfort;
mod config;
mod epw_comfort;
mod error;
pub mod stations;
pub mod types;
mod utils;

pub use config::ComfortConfig;
pub use epw_comfort::*;
pub use error::ComfortError;
pub use utils::get_cache_dir;

pub use types::lat_lon::LatLon;
pub use types::station::StationRecord;
pub use types::units::Units;
pub use types::weather_series::{DataPeriod, EpwHeader, EpwLocation, EpwRecord, WeatherTimeSeries};

pub use stations::document_store::{DocumentSource, DocumentStore};
pub use stations::error::LocateStationError;
pub use stations::station_store::{InMemoryStations, StationStore};

pub use archive::acquirer::{ArchiveAcquirer, ExtractedArchive};
pub use archive::error::{ArchiveError, ParseError};
pub use archive::parser::{decode_archive, Coercion, EpwParser};
pub use archive::schema::EpwField;

pub use comfort::categories::{CategoryEntry, CategoryTable, CategoryTables};
pub use comfort::engine::{
    utci, utci_unrounded, CategoryKind, ComfortEngine, ComfortReport, ComfortResult, LabelShare,
    ThermalInput,
};
pub use comfort::error::CategoryError;
