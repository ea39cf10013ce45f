//! Remote retrieval of monthly crime batches.
//!
//! This module provides the `ApiClient` for the police.uk crime data
//! endpoint, the `BatchSource` seam it implements, and `fetch_range`, which
//! walks a month range sequentially and concatenates the results.

pub mod client;
pub mod error;
pub mod fetch;

pub use client::{parse_batch, ApiClient};
pub use error::ApiError;
pub use fetch::{fetch_range, BatchSource};
