//! Error types for the course API

use std::io;

use thiserror::Error;

use crate::auth::AuthError;

/// Result type alias for the course API
pub type Result<T> = std::result::Result<T, Error>;

/// Startup and operator-facing errors.
///
/// Request-level failures use [`AuthError`] and
/// [`ServiceError`](crate::service::ServiceError) instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication error outside a request (CLI token checks, key listing)
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
