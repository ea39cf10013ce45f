//! Local CSV cache of the incident dataset.
//!
//! This module provides the `CacheManager`, which loads and persists the
//! full dataset as a single comma-separated file with a header row. The
//! `date` column carries the batch month as `YYYY-MM-DD`; `category` and
//! `location` are required; every other column is passed through.
//!
//! A small JSON sidecar (`<cache>.coverage.json`) records the first and last
//! month fetched, so months that returned no incidents are not requested
//! again.

pub mod manager;

pub use manager::{format_age, CacheManager};
