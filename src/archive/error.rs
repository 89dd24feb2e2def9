use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid EPW header at line {line}: {reason}")]
    Header { line: usize, reason: String },

    #[error("EPW header row {line} is not valid UTF-8")]
    Encoding {
        line: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Failed to read EPW file '{0}'")]
    FileRead(PathBuf, #[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Archive download failed")]
    DownloadIo(#[from] std::io::Error),

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Failed to open zip archive")]
    Zip(#[from] zip::result::ZipError),

    #[error("No .epw entry found in archive from {source_name}")]
    NoArchiveEntry { source_name: String },

    #[error("Failed to extract archive to a temporary directory")]
    TempExtraction(#[source] std::io::Error),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to read cached archive '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write cached archive '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to delete cached archive '{0}'")]
    CacheDeletion(PathBuf, #[source] std::io::Error),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
