use crate::archive::error::ArchiveError;
use crate::archive::parser::decode_archive;
use crate::types::station::StationRecord;
use futures_util::TryStreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::{fs, task};
use tokio_util::io::StreamReader;
use zip::ZipArchive;

/// Default limit for a single archive download.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];
const ARCHIVE_CACHE_DIR: &str = "archives";
const EXTRACTED_FALLBACK_NAME: &str = "archive.epw";
/// Upper bound on the buffer reserved from a zip entry's declared size.
/// A year of hourly EPW rows is under 2 MiB.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// An EPW file extracted into a temporary directory.
///
/// The directory and everything in it are removed when this value is dropped.
#[derive(Debug)]
pub struct ExtractedArchive {
    dir: TempDir,
    path: PathBuf,
}

impl ExtractedArchive {
    /// Location of the extracted `.epw` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn read_to_string(&self) -> Result<String, ArchiveError> {
        std::fs::read_to_string(&self.path).map_err(ArchiveError::TempExtraction)
    }
}

/// Downloads station archives and turns them into EPW text.
///
/// A download is one HTTP GET bounded by the client timeout. Failures are
/// reported, never retried. When a cache directory is configured, the
/// extracted text of each station is stored under
/// `<cache_dir>/archives/<station id>.epw` and reused on later requests.
#[derive(Debug, Clone)]
pub struct ArchiveAcquirer {
    client: Client,
    cache_dir: Option<PathBuf>,
}

impl ArchiveAcquirer {
    pub fn new(timeout: Duration, cache_dir: Option<PathBuf>) -> Result<Self, ArchiveError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ArchiveError::ClientBuild)?;
        Ok(Self::with_client(client, cache_dir))
    }

    pub fn with_client(client: Client, cache_dir: Option<PathBuf>) -> Self {
        ArchiveAcquirer { client, cache_dir }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Downloads `url` and returns the EPW text it contains.
    pub async fn fetch_archive(&self, url: &str) -> Result<String, ArchiveError> {
        let bytes = self.download(url).await?;
        let source_name = url.to_string();
        let (_, contents) =
            task::spawn_blocking(move || select_epw_entry(bytes, &source_name)).await??;
        Ok(decode_archive(contents)?)
    }

    /// EPW text for `station`, served from the cache when possible.
    pub async fn get_archive(&self, station: &StationRecord) -> Result<String, ArchiveError> {
        let Some(cache_path) = self.cache_path(&station.id) else {
            return self.fetch_archive(&station.url).await;
        };

        if fs::metadata(&cache_path).await.is_ok() {
            info!(
                "Cache hit for archive of station {} at {:?}",
                station.id, cache_path
            );
            return fs::read_to_string(&cache_path)
                .await
                .map_err(|e| ArchiveError::CacheRead(cache_path, e));
        }

        warn!(
            "Cache miss for archive of station {}. Downloading {}",
            station.id, station.url
        );
        let text = self.fetch_archive(&station.url).await?;
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ArchiveError::CacheDirCreation(parent.to_path_buf(), e))?;
        }
        fs::write(&cache_path, &text)
            .await
            .map_err(|e| ArchiveError::CacheWrite(cache_path.clone(), e))?;
        info!(
            "Cached archive of station {} to {:?}",
            station.id, cache_path
        );
        Ok(text)
    }

    /// Removes the cached archive of a station. A missing entry is not an error.
    pub async fn clear_cache(&self, station_id: &str) -> Result<(), ArchiveError> {
        let Some(cache_path) = self.cache_path(station_id) else {
            return Ok(());
        };
        match fs::remove_file(&cache_path).await {
            Ok(()) => {
                info!("Removed cached archive {:?}", cache_path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ArchiveError::CacheDeletion(cache_path, e)),
        }
    }

    fn cache_path(&self, station_id: &str) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| {
            dir.join(ARCHIVE_CACHE_DIR)
                .join(format!("{}.epw", cache_file_stem(station_id)))
        })
    }

    /// Raw response body of a single GET request.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, ArchiveError> {
        info!("Downloading archive from {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ArchiveError::NetworkRequest(url.to_string(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    ArchiveError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    }
                } else {
                    ArchiveError::NetworkRequest(url.to_string(), e)
                });
            }
        };

        let stream = response.bytes_stream().map_err(io::Error::other);
        let mut reader = StreamReader::new(stream);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }

    /// Writes the EPW file held by `bytes` into a fresh temporary directory.
    pub async fn extract_to_temp(bytes: Vec<u8>) -> Result<ExtractedArchive, ArchiveError> {
        task::spawn_blocking(move || {
            let (name, contents) = select_epw_entry(bytes, "payload")?;
            let dir = TempDir::new().map_err(ArchiveError::TempExtraction)?;
            let file_name = Path::new(&name)
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| EXTRACTED_FALLBACK_NAME.into());
            let path = dir.path().join(file_name);
            std::fs::write(&path, contents).map_err(ArchiveError::TempExtraction)?;
            Ok::<_, ArchiveError>(ExtractedArchive { dir, path })
        })
        .await?
    }
}

/// File name stem for a station id. Bytes outside `[A-Za-z0-9_-]` are
/// percent-encoded, so distinct ids never share a cache file.
fn cache_file_stem(station_id: &str) -> String {
    let mut stem = String::with_capacity(station_id.len());
    for byte in station_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    stem
}

/// Initial buffer size for an entry whose header declares `declared` bytes.
/// The declared size comes from the archive and is only a hint.
fn reserved_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOCATION) as usize
}

/// Picks the EPW payload out of downloaded bytes.
///
/// Zip payloads yield the first entry, in archive order, whose name ends in
/// `.epw` (any case). Anything else is taken to be the EPW text itself.
/// Returns the entry name with its contents.
pub fn select_epw_entry(
    bytes: Vec<u8>,
    source_name: &str,
) -> Result<(String, Vec<u8>), ArchiveError> {
    if !bytes.starts_with(&ZIP_MAGIC) {
        return Ok((EXTRACTED_FALLBACK_NAME.to_string(), bytes));
    }

    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if !entry.is_file() || !entry.name().to_ascii_lowercase().ends_with(".epw") {
            continue;
        }
        let name = entry.name().to_string();
        let mut contents = Vec::with_capacity(reserved_capacity(entry.size()));
        entry.read_to_end(&mut contents)?;
        debug!("Selected archive entry {} ({} bytes)", name, contents.len());
        return Ok((name, contents));
    }

    Err(ArchiveError::NoArchiveEntry {
        source_name: source_name.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::archive::parser::fixtures::epw_text;
    use crate::stations::station_store::tests::station;
    use crate::utils::test_server::{serve_at_path, serve_once};
    use std::io::Write;
    use tokio::net::TcpListener;
    use zip::write::SimpleFileOptions;

    pub(crate) fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn selects_first_epw_entry_in_archive_order() {
        let bytes = zip_bytes(&[
            ("readme.txt", "not weather"),
            ("data/STATION.EPW", "first"),
            ("other.epw", "second"),
        ]);
        let (name, contents) = select_epw_entry(bytes, "test").unwrap();
        assert_eq!(name, "data/STATION.EPW");
        assert_eq!(contents, b"first");
    }

    #[test]
    fn archive_without_epw_entry_fails() {
        let bytes = zip_bytes(&[("readme.txt", "x"), ("station.ddy", "y")]);
        assert!(matches!(
            select_epw_entry(bytes, "http://host/a.zip"),
            Err(ArchiveError::NoArchiveEntry { ref source_name }) if source_name == "http://host/a.zip"
        ));
    }

    #[test]
    fn plain_text_passes_through() {
        let (name, contents) = select_epw_entry(b"LOCATION,x".to_vec(), "test").unwrap();
        assert_eq!(name, EXTRACTED_FALLBACK_NAME);
        assert_eq!(contents, b"LOCATION,x");
    }

    #[tokio::test]
    async fn temp_extraction_is_cleaned_up_on_drop() {
        let bytes = zip_bytes(&[("nested/station.epw", "LOCATION,x")]);
        let extracted = ArchiveAcquirer::extract_to_temp(bytes).await.unwrap();
        let dir = extracted.dir().to_path_buf();
        assert!(extracted.path().ends_with("station.epw"));
        assert_eq!(extracted.read_to_string().unwrap(), "LOCATION,x");
        drop(extracted);
        assert!(!dir.exists());

        let failed = ArchiveAcquirer::extract_to_temp(zip_bytes(&[("a.txt", "x")])).await;
        assert!(matches!(failed, Err(ArchiveError::NoArchiveEntry { .. })));
    }

    #[tokio::test]
    async fn fetches_zipped_archive_over_http() {
        let text = epw_text(24);
        let url = serve_once(200, zip_bytes(&[("station.epw", &text)])).await;
        let acquirer = ArchiveAcquirer::new(DEFAULT_TIMEOUT, None).unwrap();
        assert_eq!(acquirer.fetch_archive(&url).await.unwrap(), text);
    }

    #[tokio::test]
    async fn http_error_is_not_retried() {
        let url = serve_once(500, b"boom".to_vec()).await;
        let acquirer = ArchiveAcquirer::new(DEFAULT_TIMEOUT, None).unwrap();
        assert!(matches!(
            acquirer.fetch_archive(&url).await,
            Err(ArchiveError::HttpStatus { status, .. }) if status.as_u16() == 500
        ));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(socket);
            }
        });
        let acquirer = ArchiveAcquirer::new(Duration::from_millis(200), None).unwrap();
        let result = acquirer.fetch_archive(&format!("http://{}/slow.zip", addr)).await;
        assert!(matches!(result, Err(ArchiveError::NetworkRequest(..))));
    }

    #[test]
    fn cache_names_are_distinct_per_station() {
        assert_eq!(cache_file_stem("027240"), "027240");
        assert_eq!(cache_file_stem("USA_1"), "USA_1");
        assert_eq!(cache_file_stem("USA:1"), "USA%3A1");
        assert_eq!(cache_file_stem("../x"), "%2E%2E%2Fx");
        assert_eq!(cache_file_stem("50%"), "50%25");
        assert_ne!(cache_file_stem("a%3A"), cache_file_stem("a:"));
    }

    #[test]
    fn declared_entry_size_is_capped() {
        assert_eq!(reserved_capacity(1200), 1200);
        assert_eq!(reserved_capacity(u64::MAX), MAX_PREALLOCATION as usize);
        assert_eq!(reserved_capacity(0xFFFF_FFF0), MAX_PREALLOCATION as usize);
    }

    #[tokio::test]
    async fn similar_station_ids_keep_separate_caches() {
        let cache = tempfile::tempdir().unwrap();
        let acquirer =
            ArchiveAcquirer::new(DEFAULT_TIMEOUT, Some(cache.path().to_path_buf())).unwrap();
        let (text_a, text_b) = (epw_text(2), epw_text(5));

        let mut a = station("USA:1", 40.0, -74.0);
        a.url = serve_at_path("/a.zip", 200, zip_bytes(&[("a.epw", &text_a)])).await;
        let mut b = station("USA_1", 41.0, -74.0);
        b.url = serve_at_path("/b.zip", 200, zip_bytes(&[("b.epw", &text_b)])).await;

        assert_eq!(acquirer.get_archive(&a).await.unwrap(), text_a);
        assert_eq!(acquirer.get_archive(&b).await.unwrap(), text_b);
        assert_eq!(acquirer.get_archive(&a).await.unwrap(), text_a);
    }

    #[tokio::test]
    async fn cached_archive_is_reused() {
        let cache = tempfile::tempdir().unwrap();
        let text = epw_text(2);
        let url = serve_at_path("/lumparland.zip", 200, zip_bytes(&[("a.epw", &text)])).await;
        let acquirer =
            ArchiveAcquirer::new(DEFAULT_TIMEOUT, Some(cache.path().to_path_buf())).unwrap();

        let mut record = station("027240", 60.1, 20.3);
        record.url = url;
        assert_eq!(acquirer.get_archive(&record).await.unwrap(), text);
        assert!(cache
            .path()
            .join(ARCHIVE_CACHE_DIR)
            .join("027240.epw")
            .exists());

        // An unreachable URL proves the second answer comes from disk.
        record.url = "http://127.0.0.1:1/unreachable.zip".to_string();
        assert_eq!(acquirer.get_archive(&record).await.unwrap(), text);

        acquirer.clear_cache(&record.id).await.unwrap();
        acquirer.clear_cache(&record.id).await.unwrap();
        assert!(acquirer.get_archive(&record).await.is_err());
    }
}
