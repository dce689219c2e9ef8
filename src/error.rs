//! Crate-level error type.
//!
//! Per-row provider and geocoding failures never surface here: they degrade to
//! an empty evidence slot. Only configuration and I/O problems abort a run.

use thiserror::Error;

use crate::location::LocationError;
use crate::providers::ProviderError;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing row source, bad dates, unknown cache names.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, Error>;
