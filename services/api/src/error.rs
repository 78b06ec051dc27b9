//! services/api/src/error.rs
//!
//! Startup failures of the `api` service. Request-level failures never reach
//! this type; handlers answer with a status code instead.

use crate::config::ConfigError;
use axum::http::header::InvalidHeaderValue;
use festival_stories_core::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The record store could not be prepared.
    #[error("Record store error: {0}")]
    Port(#[from] PortError),

    /// Binding the listener or serving failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CORS_ORIGIN '{origin}' is not a valid header value: {source}")]
    CorsOrigin {
        origin: String,
        #[source]
        source: InvalidHeaderValue,
    },
}
