use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocateStationError {
    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Invalid search radius: {0} km")]
    InvalidRadius(f64),

    #[error("Station '{id}' has an invalid location ({latitude}, {longitude})")]
    InvalidStation {
        id: String,
        latitude: f64,
        longitude: f64,
    },

    #[error("Failed to read station documents from '{0}'")]
    DocumentRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to read cache file '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write cache file '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode cache data from '{0}'")]
    CacheDecode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to encode cache data")]
    CacheEncode(#[source] Box<bincode::error::EncodeError>),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    // Covers errors during download stream processing and decompression
    #[error("Station document download or decompression failed")]
    DownloadIo(#[from] std::io::Error),

    #[error("Failed to parse station documents")]
    JsonParse(#[from] serde_json::Error),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
