//! Error types for every fallible stage of a run.
//!
//! Per-request failures are *not* errors: they are recorded as
//! [`crate::metric::Outcome::Failure`] and the run carries on.

use std::path::PathBuf;

/// A configuration value was rejected before the run started.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid target url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("`{field}` must be greater than zero")]
    Zero { field: &'static str },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persisting or rendering a report failed.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed results json: {0}")]
    Json(#[from] serde_json::Error),
}

/// The controller itself could not run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("metrics aggregator task failed: {0}")]
    Aggregator(#[from] tokio::task::JoinError),
}
