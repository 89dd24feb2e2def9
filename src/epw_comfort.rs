//! The main entry point of the crate. [`EpwComfort`] ties the station
//! search, archive acquisition, parsing and the UTCI computation together.

use crate::archive::acquirer::ArchiveAcquirer;
use crate::archive::error::ArchiveError;
use crate::archive::parser::EpwParser;
use crate::comfort::engine::{ComfortEngine, ComfortReport};
use crate::config::ComfortConfig;
use crate::error::ComfortError;
use crate::stations::distance::haversine_km;
use crate::stations::document_store::{DocumentSource, DocumentStore};
use crate::stations::station_store::StationStore;
use crate::types::lat_lon::LatLon;
use crate::types::station::StationRecord;
use crate::types::weather_series::WeatherTimeSeries;
use crate::utils::ensure_cache_dir_exists;
use bon::bon;
use futures_util::future::join_all;
use log::{debug, info};
use ordered_float::OrderedFloat;
use std::path::PathBuf;

/// The outcome of analysing one station: its record, the parsed archive and
/// the UTCI report for every time step.
#[derive(Debug, Clone)]
pub struct StationAnalysis {
    pub station: StationRecord,
    pub series: WeatherTimeSeries,
    pub report: ComfortReport,
}

/// The client for finding stations and computing thermal comfort from their
/// weather archives.
///
/// A client owns a station store, an HTTP client with the configured
/// timeout, an EPW parser and a [`ComfortEngine`]. Downloaded archives are
/// cached on disk unless caching is turned off in the [`ComfortConfig`].
///
/// # Examples
///
/// ```rust
/// # use epw_comfort::{ComfortConfig, ComfortError, EpwComfort, InMemoryStations, LatLon};
/// # async fn run() -> Result<(), ComfortError> {
/// let store = InMemoryStations::new(vec![])?;
/// let client = EpwComfort::with_store(store, ComfortConfig::default()).await?;
/// let nearby = client.find_station().location(LatLon(52.52, 13.40)).call()?;
/// assert!(nearby.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct EpwComfort {
    stations: Box<dyn StationStore>,
    acquirer: ArchiveAcquirer,
    parser: EpwParser,
    engine: ComfortEngine,
    cache_dir: Option<PathBuf>,
}

#[bon]
impl EpwComfort {
    /// Creates a client around an existing station store.
    ///
    /// # Arguments
    ///
    /// * `store` - Any [`StationStore`], for instance an
    ///   [`crate::InMemoryStations`] built from records at hand.
    /// * `config` - Cache location, timeout, coercion mode and category tables.
    ///
    /// # Errors
    ///
    /// Returns [`ComfortError::CacheDirCreation`] if the cache directory
    /// cannot be created, or [`ComfortError::Archive`] if the HTTP client
    /// cannot be built.
    pub async fn with_store(
        store: impl StationStore + 'static,
        config: ComfortConfig,
    ) -> Result<Self, ComfortError> {
        let cache_dir = Self::prepare_cache_dir(&config).await?;
        let acquirer = ArchiveAcquirer::new(config.timeout, cache_dir.clone())?;
        Ok(Self::assemble(Box::new(store), acquirer, config, cache_dir))
    }

    /// Creates a client whose stations are loaded from a JSON document array.
    ///
    /// The documents are read from a local file or downloaded, and cached as
    /// bincode in the cache directory so that later clients start quickly.
    ///
    /// # Errors
    ///
    /// Returns [`ComfortError::LocateStation`] if the documents cannot be
    /// read or parsed, and [`ComfortError::CacheDirCreation`] if the cache
    /// directory cannot be created.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use epw_comfort::{ComfortConfig, ComfortError, DocumentSource, EpwComfort};
    /// # async fn run() -> Result<(), ComfortError> {
    /// let source = DocumentSource::Path("data/stations.json.gz".into());
    /// let client = EpwComfort::from_documents(source, ComfortConfig::default()).await?;
    /// println!("{} stations loaded", client.station_store().len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn from_documents(
        source: DocumentSource,
        config: ComfortConfig,
    ) -> Result<Self, ComfortError> {
        let cache_dir = Self::prepare_cache_dir(&config).await?;
        let acquirer = ArchiveAcquirer::new(config.timeout, cache_dir.clone())?;
        let store = DocumentStore::load(acquirer.client(), &source, cache_dir.as_deref()).await?;
        info!("Loaded {} stations from {}", store.len(), source);
        Ok(Self::assemble(Box::new(store), acquirer, config, cache_dir))
    }

    fn assemble(
        stations: Box<dyn StationStore>,
        acquirer: ArchiveAcquirer,
        config: ComfortConfig,
        cache_dir: Option<PathBuf>,
    ) -> Self {
        EpwComfort {
            stations,
            acquirer,
            parser: EpwParser::new(config.coercion),
            engine: ComfortEngine::new(config.categories),
            cache_dir,
        }
    }

    async fn prepare_cache_dir(config: &ComfortConfig) -> Result<Option<PathBuf>, ComfortError> {
        let Some(cache_dir) = config.resolved_cache_dir() else {
            return Ok(None);
        };
        ensure_cache_dir_exists(&cache_dir)
            .await
            .map_err(|e| ComfortError::CacheDirCreation(cache_dir.clone(), e))?;
        Ok(Some(cache_dir))
    }

    pub fn station_store(&self) -> &dyn StationStore {
        self.stations.as_ref()
    }

    pub fn engine(&self) -> &ComfortEngine {
        &self.engine
    }

    pub fn cache_dir(&self) -> Option<&PathBuf> {
        self.cache_dir.as_ref()
    }

    /// Finds stations near a location.
    ///
    /// Without a radius the single closest station is returned (or nothing
    /// when the store is empty). With a radius every station whose
    /// great-circle distance is at most `radius_km` is returned, closest
    /// first.
    ///
    /// # Arguments
    ///
    /// * `location` - The query point as [`LatLon`].
    /// * `radius_km` - Optional search radius in kilometers.
    ///
    /// # Errors
    ///
    /// Returns [`ComfortError::LocateStation`] for coordinates outside the
    /// WGS84 range or a negative or non-finite radius.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use epw_comfort::{ComfortConfig, ComfortError, EpwComfort, InMemoryStations, LatLon, StationRecord};
    /// # async fn run() -> Result<(), ComfortError> {
    /// # let stations: Vec<StationRecord> = vec![];
    /// let client = EpwComfort::with_store(InMemoryStations::new(stations)?, ComfortConfig::default()).await?;
    /// let within = client
    ///     .find_station()
    ///     .location(LatLon(60.1, 20.3))
    ///     .radius_km(50.0)
    ///     .call()?;
    /// for station in within {
    ///     println!("{} ({})", station.name, station.id);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub fn find_station(
        &self,
        location: LatLon,
        radius_km: Option<f64>,
    ) -> Result<Vec<StationRecord>, ComfortError> {
        let Some(radius_km) = radius_km else {
            return Ok(self.stations.fetch_closest(location)?.into_iter().collect());
        };
        let mut stations = self.stations.fetch_within_radius(location, radius_km)?;
        stations.sort_by_key(|s| OrderedFloat(haversine_km(location, s.location())));
        debug!(
            "{} stations within {} km of {:?}",
            stations.len(),
            radius_km,
            location
        );
        Ok(stations)
    }

    /// Downloads (or reads from the cache) the archive of `station` and
    /// parses it.
    ///
    /// # Errors
    ///
    /// Returns [`ComfortError::Station`] naming the station when the
    /// download, the zip extraction or the header parse fails.
    pub async fn get_time_series(
        &self,
        station: &StationRecord,
    ) -> Result<WeatherTimeSeries, ComfortError> {
        self.load_series(station)
            .await
            .map_err(|source| ComfortError::Station {
                station: station.id.clone(),
                source,
            })
    }

    async fn load_series(&self, station: &StationRecord) -> Result<WeatherTimeSeries, ArchiveError> {
        let text = self.acquirer.get_archive(station).await?;
        let parser = self.parser;
        let series = tokio::task::spawn_blocking(move || parser.parse(&text)).await??;
        info!(
            "Parsed {} records for station {} ({} missing fields)",
            series.len(),
            station.id,
            series.missing_count()
        );
        Ok(series)
    }

    /// UTCI and both category labels for every time step of `series`.
    pub fn compute_comfort(&self, series: &WeatherTimeSeries) -> ComfortReport {
        self.engine.compute(series)
    }

    /// Finds the closest station to `location` (optionally limited to
    /// `radius_km`), then fetches, parses and evaluates its archive.
    ///
    /// # Errors
    ///
    /// * [`ComfortError::NoStationWithinRadius`] if a radius was given and no
    ///   station lies inside it.
    /// * [`ComfortError::NoStations`] if the store is empty.
    /// * Any error of [`EpwComfort::find_station`] or
    ///   [`EpwComfort::get_time_series`].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use epw_comfort::{CategoryKind, ComfortConfig, ComfortError, DocumentSource, EpwComfort, LatLon};
    /// # async fn run() -> Result<(), ComfortError> {
    /// # let client = EpwComfort::from_documents(DocumentSource::Path("stations.json".into()), ComfortConfig::default()).await?;
    /// let analysis = client
    ///     .analyze_location()
    ///     .location(LatLon(60.1, 20.3))
    ///     .radius_km(100.0)
    ///     .call()
    ///     .await?;
    /// for line in analysis.report.describe_shares(CategoryKind::Stress) {
    ///     println!("{}", line);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn analyze_location(
        &self,
        location: LatLon,
        radius_km: Option<f64>,
    ) -> Result<StationAnalysis, ComfortError> {
        let candidates = self
            .find_station()
            .location(location)
            .maybe_radius_km(radius_km)
            .call()?;
        let Some(station) = candidates.into_iter().next() else {
            return Err(match radius_km {
                Some(radius_km) => ComfortError::NoStationWithinRadius {
                    latitude: location.latitude(),
                    longitude: location.longitude(),
                    radius_km,
                },
                None => ComfortError::NoStations {
                    latitude: location.latitude(),
                    longitude: location.longitude(),
                },
            });
        };
        self.analyze_station(station).await
    }

    /// Runs the fetch, parse and compute pipeline for every station at once.
    ///
    /// The returned vector has one entry per input station, in input order.
    /// A failing station does not affect the others.
    pub async fn analyze_stations(
        &self,
        stations: &[StationRecord],
    ) -> Vec<Result<StationAnalysis, ComfortError>> {
        join_all(
            stations
                .iter()
                .map(|station| self.analyze_station(station.clone())),
        )
        .await
    }

    async fn analyze_station(&self, station: StationRecord) -> Result<StationAnalysis, ComfortError> {
        let series = self.get_time_series(&station).await?;
        let report = self.compute_comfort(&series);
        Ok(StationAnalysis {
            station,
            series,
            report,
        })
    }

    /// Removes the cached archive of a station.
    pub async fn clear_cache(&self, station: &StationRecord) -> Result<(), ComfortError> {
        self.acquirer
            .clear_cache(&station.id)
            .await
            .map_err(|source| ComfortError::Station {
                station: station.id.clone(),
                source,
            })
    }
}
