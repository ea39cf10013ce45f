//! Error types for the cache, configuration and sync layers.
//!
//! Retrieval failures live in [`crate::api::ApiError`]. An absent cache file
//! is not an error at all: loaders return `Ok(None)` for it.

use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read cache file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Cache file {path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("Cache file {path} is corrupt at line {line}: {message}")]
    Corrupt {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("Cache coverage file {path} is invalid: {source}")]
    Coverage {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode cache file {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid start month '{0}' (expected YYYY-MM)")]
    InvalidStartMonth(String),

    #[error("Smoothing window must be at least 1 month")]
    ZeroWindow,

    #[error("Category group '{0}' has no categories")]
    EmptyGroup(String),

    #[error("Category '{category}' appears in both '{first}' and '{second}'")]
    OverlappingGroups {
        first: String,
        second: String,
        category: String,
    },
}

/// Anything that can abort a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Retrieval failed for {month}: {source}")]
    Retrieval {
        month: String,
        #[source]
        source: ApiError,
    },
}

impl SyncError {
    pub fn is_corrupt_cache(&self) -> bool {
        matches!(
            self,
            SyncError::Cache(
                CacheError::Corrupt { .. }
                    | CacheError::MissingColumn { .. }
                    | CacheError::Coverage { .. }
            )
        )
    }
}
