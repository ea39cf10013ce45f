//! Data models for crime incident analysis.
//!
//! This module contains the data structures shared by the fetcher, the
//! cache and the aggregator:
//!
//! - `Month`: a calendar month, the unit of retrieval and caching
//! - `Incident`, `IncidentResponse`: one reported crime and its API shape
//! - `MonthlyBatch`, `Dataset`: per-month and accumulated incident sets
//! - `CategoryGroup`: named category partitions and label normalization

pub mod category;
pub mod incident;
pub mod month;

pub use category::{default_groups, display_label, validate_groups, CategoryGroup, TOP_CATEGORIES};
pub use incident::{Dataset, Incident, IncidentResponse, MonthlyBatch};
pub use month::Month;
