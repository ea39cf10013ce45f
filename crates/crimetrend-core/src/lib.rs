//! Core library for crimetrend.
//!
//! Fetches monthly crime batches for one police force area, keeps them in a
//! local CSV cache, brings the cache up to date incrementally, and builds the
//! month by category tables the viewer charts.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod stats;
pub mod update;

pub use api::{ApiClient, ApiError, BatchSource};
pub use cache::CacheManager;
pub use config::Config;
pub use error::{CacheError, ConfigError, SyncError};
pub use models::{CategoryGroup, Dataset, Incident, Month, MonthlyBatch};
pub use stats::{CountTable, NormalizedTable, SmoothedTable, Table};
pub use update::{sync_dataset, SyncOutcome, SyncReport, SyncSettings};
