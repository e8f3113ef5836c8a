//! Error types for the HTTP disk cache
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache and its gateway.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache directory is missing and could not be created
    #[error("Cache directory {} is unavailable: {source}", path.display())]
    BasePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An entry could not be written or atomically replaced
    #[error("Failed to write cache entry {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Entry file could not be decoded
    #[error("Corrupt cache entry: {0}")]
    CorruptEntry(String),

    /// Origin or network failure reported by the transport
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// No entry stored for the requested URL
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Wraps any transport-level failure.
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CacheError::Transport(Box::new(error))
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(error: reqwest::Error) -> Self {
        CacheError::transport(error)
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Transport(_) => StatusCode::BAD_GATEWAY,
            CacheError::BasePath { .. }
            | CacheError::Write { .. }
            | CacheError::CorruptEntry(_)
            | CacheError::Config(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
