use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("Failed to read category document '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse category document")]
    Json(#[from] serde_json::Error),

    #[error("Category document has no '{0}' table")]
    MissingTable(String),

    #[error("Category key '{key}' must hold exactly two bounds separated by a comma")]
    BoundCount { key: String },

    #[error("Category key '{key}' has an unreadable bound '{bound}'")]
    InvalidBound { key: String, bound: String },

    #[error("Category key '{key}' has a lower bound that is not below its upper bound")]
    InvertedBounds { key: String },

    #[error("Category label for key '{key}' must be a string")]
    InvalidLabel { key: String },

    #[error("Process-wide category tables are already initialised")]
    AlreadyInitialised,
}
