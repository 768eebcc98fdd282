//! Custom error types for translation operations

use thiserror::Error;

/// Translation-related errors
#[derive(Error, Debug)]
pub enum TranslationError {
    /// API request failed
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code returned by the translation API
        status: u16,
        /// Error body or reason
        message: String,
    },

    /// Network error
    #[error("Network error: {message}")]
    NetworkError {
        /// Underlying transport failure
        message: String,
    },

    /// Invalid response from API
    #[error("Invalid response: {message}")]
    InvalidResponseError {
        /// What was missing or malformed
        message: String,
    },

    /// Persisted cache file exists but cannot be parsed. Fatal for that
    /// book's session: an empty cache here would re-bill paragraphs that
    /// were already paid for.
    #[error("Corrupt translation cache: {path} - {message}")]
    CacheError {
        /// Cache file path
        path: String,
        /// Parse failure detail
        message: String,
    },

    /// File operation error
    #[error("File error: {path} - {message}")]
    FileError {
        /// Offending path
        path: String,
        /// OS-level detail
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// What failed validation
        message: String,
    },

    /// Invalid file format
    #[error("Invalid file format: {format}")]
    InvalidFormat {
        /// Format description
        format: String,
    },

    /// Wrapper for anyhow errors
    #[error("Internal error: {0}")]
    InternalError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Zip archive error
    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),
}

impl From<anyhow::Error> for TranslationError {
    fn from(err: anyhow::Error) -> Self {
        TranslationError::InternalError(err.to_string())
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslationError>;
