//! Error types for the wallet catalog

use thiserror::Error;

/// Result type alias for catalog operations
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Catalog error types
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to fetch wallet catalog: {0}")]
    FetchError(String),

    #[error("Invalid wallet catalog format: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Duplicate wallet id: {0}")]
    DuplicateWallet(String),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
