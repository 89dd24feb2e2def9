use crate::stations::distance::{
    chord_for_distance, haversine_km, unit_vector, validate_coordinate, validate_radius,
};
use crate::stations::error::LocateStationError;
use crate::stations::station_store::{validate_stations, StationStore};
use crate::types::lat_lon::LatLon;
use crate::types::station::StationRecord;
use async_compression::tokio::bufread::GzipDecoder;
use bincode::config::{Configuration, Fixint, LittleEndian};
use futures_util::TryStreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, BufReader};
use tokio_util::io::StreamReader;

const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
// Chord lengths are compared in squared form; absorbs rounding in the
// sphere projection so boundary stations reach the haversine check.
const CHORD_SLACK: f64 = 1e-9;

/// Where the station documents of a [`DocumentStore`] come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// A JSON array on disk, optionally gzip compressed.
    Path(PathBuf),
    /// A JSON array served over HTTP(S), optionally gzip compressed.
    Url(String),
}

impl DocumentSource {
    /// Cache file name for this source. Different sources never share a file.
    fn cache_file_name(&self) -> String {
        let raw = match self {
            DocumentSource::Path(p) => p.to_string_lossy().into_owned(),
            DocumentSource::Url(u) => u.clone(),
        };
        let sanitized: String = raw
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("stations_{}.bin", sanitized)
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Path(p) => write!(f, "{}", p.display()),
            DocumentSource::Url(u) => write!(f, "{}", u),
        }
    }
}

/// A station as a point on the unit sphere, pointing back into the record list.
#[derive(Debug, Clone, Copy)]
struct SpherePoint {
    xyz: [f64; 3],
    index: usize,
}

impl RTreeObject for SpherePoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.xyz)
    }
}

impl PointDistance for SpherePoint {
    /// Squared chord length between the station and `point`.
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.xyz[0] - point[0];
        let dy = self.xyz[1] - point[1];
        let dz = self.xyz[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// A station store backed by a document collection and an R-tree index.
///
/// Stations are indexed by their position on the unit sphere. The straight
/// line (chord) between two points grows with their great-circle distance, so
/// the tree can prune candidates without ever changing which stations count as
/// closest or within a radius. The final decision is always made with the
/// haversine distance, identical to [`crate::InMemoryStations`].
///
/// Loaded documents can be cached as bincode in a cache directory, so that
/// the next load skips the download and JSON parsing.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    stations: Vec<StationRecord>,
    rtree: RTree<SpherePoint>,
}

impl DocumentStore {
    /// Indexes an already loaded list of stations.
    ///
    /// # Errors
    ///
    /// Returns [`LocateStationError::InvalidStation`] when a record has a
    /// coordinate outside the WGS84 range.
    pub fn from_stations(stations: Vec<StationRecord>) -> Result<Self, LocateStationError> {
        validate_stations(&stations)?;
        Ok(Self::index(stations))
    }

    fn index(stations: Vec<StationRecord>) -> Self {
        let points = stations
            .iter()
            .enumerate()
            .map(|(index, s)| SpherePoint {
                xyz: unit_vector(s.location()),
                index,
            })
            .collect();
        let rtree = RTree::bulk_load(points);
        DocumentStore { stations, rtree }
    }

    /// Parses a JSON array of station documents.
    ///
    /// Documents that do not describe a station, or that carry a coordinate
    /// outside the WGS84 range, are skipped with a warning.
    pub fn from_json(bytes: &[u8]) -> Result<Self, LocateStationError> {
        Ok(Self::index(parse_documents(bytes)?))
    }

    /// Loads documents from `source`, using `cache_dir` when given.
    ///
    /// On a cache hit the bincode file is decoded and the source is not
    /// touched. On a miss the source is read, parsed and written to the cache.
    pub async fn load(
        client: &Client,
        source: &DocumentSource,
        cache_dir: Option<&Path>,
    ) -> Result<Self, LocateStationError> {
        let Some(cache_dir) = cache_dir else {
            let stations = Self::fetch_stations(client, source).await?;
            return Ok(Self::index(stations));
        };

        let cache_file = cache_dir.join(source.cache_file_name());
        let stations = if tokio::fs::metadata(&cache_file).await.is_ok() {
            info!("Station cache hit for {} at {:?}", source, cache_file);
            let path_clone = cache_file.clone();
            tokio::task::spawn_blocking(move || Self::get_cached_stations(&path_clone)).await??
        } else {
            warn!("Station cache miss for {}. Loading documents.", source);
            let stations = Self::fetch_stations(client, source).await?;
            tokio::fs::create_dir_all(cache_dir)
                .await
                .map_err(|e| LocateStationError::CacheWrite(cache_dir.to_path_buf(), e))?;
            Self::cache_stations(stations.clone(), &cache_file).await?;
            stations
        };

        Ok(Self::index(stations))
    }

    /// Removes the cached copy of `source` from `cache_dir`, if present.
    pub async fn clear_cache(
        source: &DocumentSource,
        cache_dir: &Path,
    ) -> Result<(), LocateStationError> {
        let cache_file = cache_dir.join(source.cache_file_name());
        match tokio::fs::remove_file(&cache_file).await {
            Ok(()) => {
                info!("Removed station cache {:?}", cache_file);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LocateStationError::CacheWrite(cache_file, e)),
        }
    }

    fn get_cached_stations(cache_path: &Path) -> Result<Vec<StationRecord>, LocateStationError> {
        let bytes = std::fs::read(cache_path)
            .map_err(|e| LocateStationError::CacheRead(cache_path.to_path_buf(), e))?;
        let (decoded, _) = bincode::serde::decode_from_slice::<Vec<StationRecord>, _>(
            &bytes,
            BINCODE_CONFIG,
        )
        .map_err(|e| LocateStationError::CacheDecode(cache_path.to_path_buf(), Box::from(e)))?;
        Ok(decoded)
    }

    async fn cache_stations(
        stations: Vec<StationRecord>,
        cache_path: &Path,
    ) -> Result<(), LocateStationError> {
        let bincode_data = tokio::task::spawn_blocking(move || {
            bincode::serde::encode_to_vec(stations, BINCODE_CONFIG)
                .map_err(|e| LocateStationError::CacheEncode(Box::new(e)))
        })
        .await??;
        tokio::fs::write(cache_path, &bincode_data)
            .await
            .map_err(|e| LocateStationError::CacheWrite(cache_path.to_path_buf(), e))?;
        info!(
            "Wrote station cache ({} bytes) to {}",
            bincode_data.len(),
            cache_path.display()
        );
        Ok(())
    }

    async fn fetch_stations(
        client: &Client,
        source: &DocumentSource,
    ) -> Result<Vec<StationRecord>, LocateStationError> {
        let raw = match source {
            DocumentSource::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| LocateStationError::DocumentRead(path.clone(), e))?,
            DocumentSource::Url(url) => Self::download(client, url).await?,
        };
        let json = decompress_if_gzip(raw).await?;
        let stations = tokio::task::spawn_blocking(move || parse_documents(&json)).await??;
        info!("Loaded {} stations from {}", stations.len(), source);
        Ok(stations)
    }

    async fn download(client: &Client, url: &str) -> Result<Vec<u8>, LocateStationError> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| LocateStationError::NetworkRequest(url.to_string(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(if let Some(status) = e.status() {
                    LocateStationError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    }
                } else {
                    LocateStationError::NetworkRequest(url.to_string(), e)
                });
            }
        };
        let stream = response.bytes_stream().map_err(io::Error::other);
        let mut reader = BufReader::new(StreamReader::new(stream));
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        debug!("Downloaded {} bytes of station documents from {}", bytes.len(), url);
        Ok(bytes)
    }
}

async fn decompress_if_gzip(raw: Vec<u8>) -> Result<Vec<u8>, LocateStationError> {
    if !raw.starts_with(&GZIP_MAGIC) {
        return Ok(raw);
    }
    let mut decoder = GzipDecoder::new(BufReader::new(raw.as_slice()));
    let mut decompressed = Vec::with_capacity(raw.len() * 4);
    decoder.read_to_end(&mut decompressed).await?;
    Ok(decompressed)
}

/// Document keys read as text, whether the document stores a string or a number.
const TEXT_KEYS: [&str; 6] = ["_id", "id", "wmo", "period", "years", "years_of_record"];

fn numbers_to_text(doc: &mut serde_json::Value) {
    let Some(fields) = doc.as_object_mut() else {
        return;
    };
    for key in TEXT_KEYS {
        let Some(value) = fields.get_mut(key) else {
            continue;
        };
        let text = match value {
            serde_json::Value::Number(n) => n.to_string(),
            _ => continue,
        };
        *value = serde_json::Value::String(text);
    }
}

fn parse_documents(bytes: &[u8]) -> Result<Vec<StationRecord>, LocateStationError> {
    let documents: Vec<serde_json::Value> = serde_json::from_slice(bytes)?;
    let total = documents.len();
    let stations: Vec<StationRecord> = documents
        .into_iter()
        .map(|mut doc| {
            numbers_to_text(&mut doc);
            doc
        })
        .filter_map(|doc| match serde_json::from_value::<StationRecord>(doc) {
            Ok(station) if validate_coordinate(station.location()).is_ok() => Some(station),
            Ok(station) => {
                warn!(
                    "Skipping station '{}' with invalid location ({}, {})",
                    station.id, station.latitude, station.longitude
                );
                None
            }
            Err(e) => {
                warn!("Skipping malformed station document: {}", e);
                None
            }
        })
        .collect();
    if stations.len() < total {
        warn!("Skipped {} of {} station documents", total - stations.len(), total);
    }
    Ok(stations)
}

impl StationStore for DocumentStore {
    fn stations(&self) -> &[StationRecord] {
        &self.stations
    }

    fn fetch_closest(
        &self,
        location: LatLon,
    ) -> Result<Option<StationRecord>, LocateStationError> {
        validate_coordinate(location)?;
        let query = unit_vector(location);
        let mut candidates = self.rtree.nearest_neighbor_iter_with_distance_2(&query);
        let Some((first, best_chord_2)) = candidates.next() else {
            return Ok(None);
        };

        // Stations at (nearly) the same chord distance are resolved with the
        // haversine distance, then by store order.
        let mut best = (haversine_km(location, self.stations[first.index].location()), first.index);
        for (point, chord_2) in candidates {
            if chord_2 > best_chord_2 + CHORD_SLACK {
                break;
            }
            let dist_km = haversine_km(location, self.stations[point.index].location());
            if (dist_km, point.index) < best {
                best = (dist_km, point.index);
            }
        }
        Ok(Some(self.stations[best.1].clone()))
    }

    fn fetch_within_radius(
        &self,
        location: LatLon,
        radius_km: f64,
    ) -> Result<Vec<StationRecord>, LocateStationError> {
        validate_coordinate(location)?;
        validate_radius(radius_km)?;
        let query = unit_vector(location);
        let chord = chord_for_distance(radius_km) + CHORD_SLACK;
        let mut indices: Vec<usize> = self
            .rtree
            .locate_within_distance(query, chord * chord)
            .map(|p| p.index)
            .filter(|&i| haversine_km(location, self.stations[i].location()) <= radius_km)
            .collect();
        indices.sort_unstable();
        Ok(indices.into_iter().map(|i| self.stations[i].clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stations::station_store::tests::{example_stations, station};
    use crate::stations::station_store::InMemoryStations;
    use crate::utils::test_server::serve_once;
    use async_compression::tokio::write::GzipEncoder;
    use tokio::io::AsyncWriteExt;

    const DOCUMENTS: &str = r#"[
        {"_id": "1", "name": "Station1", "lat": 60.0, "lng": 20.0, "url": "http://example.com/station1.zip"},
        {"_id": "2", "name": "Station2", "lat": 61.0, "lng": 21.0, "url": "http://example.com/station2.zip"},
        {"_id": "broken", "name": "No coordinates", "url": "http://example.com/broken.zip"},
        {"_id": "far", "name": "Out of range", "lat": 123.0, "lng": 0.0, "url": "http://example.com/far.zip"}
    ]"#;

    async fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzipEncoder::new(Vec::new());
        encoder.write_all(bytes).await.unwrap();
        encoder.shutdown().await.unwrap();
        encoder.into_inner()
    }

    fn grid_stations() -> Vec<StationRecord> {
        let mut stations = example_stations();
        let mut id = 100;
        for lat in (-80..=80).step_by(20) {
            for lon in (-170..=170).step_by(40) {
                stations.push(station(&id.to_string(), lat as f64 + 0.5, lon as f64 - 0.25));
                id += 1;
            }
        }
        stations
    }

    #[test]
    fn malformed_documents_are_skipped() {
        let store = DocumentStore::from_json(DOCUMENTS.as_bytes()).unwrap();
        let ids: Vec<&str> = store.stations().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn numeric_text_fields_are_accepted() {
        let documents = r#"[
            {"_id": 7, "name": "Numbers", "lat": 60.0, "lng": 20.0, "wmo": 27240,
             "period": "2007-2021", "years": 15, "url": "http://example.com/7.zip"}
        ]"#;
        let store = DocumentStore::from_json(documents.as_bytes()).unwrap();
        let station = &store.stations()[0];
        assert_eq!(station.id, "7");
        assert_eq!(station.wmo.as_deref(), Some("27240"));
        assert_eq!(station.period.as_deref(), Some("2007-2021"));
        assert_eq!(station.years_of_record.as_deref(), Some("15"));
    }

    #[test]
    fn not_an_array_is_an_error() {
        assert!(matches!(
            DocumentStore::from_json(b"{\"_id\": 1}"),
            Err(LocateStationError::JsonParse(_))
        ));
    }

    #[test]
    fn closest_agrees_with_full_scan() {
        let stations = grid_stations();
        let indexed = DocumentStore::from_stations(stations.clone()).unwrap();
        let scanned = InMemoryStations::new(stations).unwrap();
        for query in [
            LatLon(60.01, 20.01),
            LatLon(0.0, 0.0),
            LatLon(-45.3, 179.9),
            LatLon(45.3, -179.9),
            LatLon(89.9, 12.0),
            LatLon(-12.5, 77.7),
        ] {
            let a = indexed.fetch_closest(query).unwrap().unwrap();
            let b = scanned.fetch_closest(query).unwrap().unwrap();
            assert_eq!(
                haversine_km(query, a.location()),
                haversine_km(query, b.location()),
                "query {:?}",
                query
            );
        }
    }

    #[test]
    fn within_radius_agrees_with_full_scan() {
        let stations = grid_stations();
        let indexed = DocumentStore::from_stations(stations.clone()).unwrap();
        let scanned = InMemoryStations::new(stations).unwrap();
        for (query, radius) in [
            (LatLon(60.01, 20.01), 150.0),
            (LatLon(0.0, 0.0), 3000.0),
            (LatLon(10.0, -180.0), 5000.0),
            (LatLon(0.0, 0.0), 30_000.0),
            (LatLon(0.0, 0.0), 0.0),
        ] {
            let mut a: Vec<String> = indexed
                .fetch_within_radius(query, radius)
                .unwrap()
                .into_iter()
                .map(|s| s.id)
                .collect();
            let mut b: Vec<String> = scanned
                .fetch_within_radius(query, radius)
                .unwrap()
                .into_iter()
                .map(|s| s.id)
                .collect();
            a.sort();
            b.sort();
            assert_eq!(a, b, "query {:?} radius {}", query, radius);
        }
    }

    #[test]
    fn radius_is_inclusive_at_the_boundary() {
        let store = DocumentStore::from_stations(example_stations()).unwrap();
        let query = LatLon(60.01, 20.01);
        let exact = haversine_km(query, LatLon(61.0, 21.0));
        let found = store.fetch_within_radius(query, exact).unwrap();
        assert!(found.iter().any(|s| s.id == "2"));
    }

    #[test]
    fn empty_store() {
        let store = DocumentStore::from_stations(Vec::new()).unwrap();
        assert!(store.fetch_closest(LatLon(0.0, 0.0)).unwrap().is_none());
        assert!(store.fetch_within_radius(LatLon(0.0, 0.0), 1e6).unwrap().is_empty());
    }

    #[tokio::test]
    async fn loads_gzip_file_and_serves_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let doc_path = dir.path().join("stations.json.gz");
        tokio::fs::write(&doc_path, gzip(DOCUMENTS.as_bytes()).await)
            .await
            .unwrap();
        let cache_dir = dir.path().join("cache");
        let source = DocumentSource::Path(doc_path.clone());
        let client = Client::new();

        let first = DocumentStore::load(&client, &source, Some(&cache_dir))
            .await
            .unwrap();
        assert_eq!(first.len(), 2);
        assert!(cache_dir.join(source.cache_file_name()).exists());

        // With the source gone, only the cache can answer.
        tokio::fs::remove_file(&doc_path).await.unwrap();
        let second = DocumentStore::load(&client, &source, Some(&cache_dir))
            .await
            .unwrap();
        assert_eq!(second.stations(), first.stations());

        DocumentStore::clear_cache(&source, &cache_dir).await.unwrap();
        assert!(matches!(
            DocumentStore::load(&client, &source, Some(&cache_dir)).await,
            Err(LocateStationError::DocumentRead(..))
        ));
    }

    #[tokio::test]
    async fn loads_documents_over_http() {
        let url = serve_once(200, DOCUMENTS.as_bytes().to_vec()).await;
        let store = DocumentStore::load(&Client::new(), &DocumentSource::Url(url), None)
            .await
            .unwrap();
        let closest = store.fetch_closest(LatLon(60.01, 20.01)).unwrap().unwrap();
        assert_eq!(closest.id, "1");
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let url = serve_once(404, b"not found".to_vec()).await;
        let result = DocumentStore::load(&Client::new(), &DocumentSource::Url(url), None).await;
        assert!(matches!(
            result,
            Err(LocateStationError::HttpStatus { status, .. }) if status.as_u16() == 404
        ));
    }
}
