//! Incremental updates and cache synchronisation.
//!
//! `update_dataset` fetches only the trailing months missing between the
//! dataset and the latest published month. `sync_dataset` wraps it with the
//! cache: load, update, persist when anything changed.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::api::{fetch_range, BatchSource};
use crate::cache::CacheManager;
use crate::config::Config;
use crate::error::{ConfigError, SyncError};
use crate::models::{Dataset, Month};

/// The latest month the upstream source is expected to have published.
///
/// Data for month M is considered stable `lag` months after `today`'s month,
/// so with a lag of 2 a run on 2024-05-01 reports 2024-03.
pub fn last_publication_month(today: NaiveDate, lag: u32) -> Month {
    Month::from_date(today).months_before(lag)
}

/// The inclusive range still to fetch, or `None` when nothing is missing.
///
/// An empty dataset (`latest == None`) starts at `start`.
pub fn missing_range(
    latest: Option<Month>,
    start: Month,
    last_published: Month,
) -> Option<(Month, Month)> {
    let from = match latest {
        Some(latest) if latest >= last_published => return None,
        Some(latest) => latest.succ(),
        None => start,
    };
    (from <= last_published).then_some((from, last_published))
}

/// Result of an incremental update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub dataset: Dataset,
    /// Months requested from the source, in order. Empty when up to date.
    pub fetched: Vec<Month>,
}

impl UpdateOutcome {
    pub fn changed(&self) -> bool {
        !self.fetched.is_empty()
    }
}

/// Append any months missing from `dataset` through `last_published`.
///
/// When there is no gap the dataset is returned unchanged and the source is
/// never called. A failed month aborts the update and discards everything
/// fetched in this call.
pub async fn update_dataset<S: BatchSource>(
    mut dataset: Dataset,
    source: &S,
    start: Month,
    last_published: Month,
) -> Result<UpdateOutcome, SyncError> {
    let Some((from, to)) = missing_range(dataset.latest_month(), start, last_published) else {
        debug!(latest = ?dataset.latest_month(), %last_published, "Dataset is up to date");
        return Ok(UpdateOutcome {
            dataset,
            fetched: Vec::new(),
        });
    };

    info!(%from, %to, "Fetching missing months");
    let fresh = fetch_range(source, from, to).await?;
    dataset.append(fresh);

    Ok(UpdateOutcome {
        dataset,
        fetched: Month::range_inclusive(from, to),
    })
}

// ============================================================================
// Sync
// ============================================================================

/// The subset of configuration a sync run needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub start_month: Month,
    pub publication_lag_months: u32,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            start_month: config.start_month()?,
            publication_lag_months: config.publication_lag_months,
        })
    }
}

/// Summary of a sync run, for logs and the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub records: usize,
    pub months_fetched: usize,
    pub persisted: bool,
    pub coverage: Option<(Month, Month)>,
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.coverage {
            Some((first, last)) => write!(f, "{} records, {} to {}", self.records, first, last)?,
            None => write!(f, "{} records", self.records)?,
        }
        if self.months_fetched > 0 {
            write!(f, " ({} months fetched)", self.months_fetched)?;
        } else {
            write!(f, " (up to date)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub dataset: Dataset,
    pub report: SyncReport,
}

/// Bring the cache up to date with the source.
///
/// The cache is written whenever it was absent or new months were appended.
/// A corrupt cache or a failed retrieval aborts the run with the cache file
/// left exactly as it was.
pub async fn sync_dataset<S: BatchSource>(
    cache: &CacheManager,
    source: &S,
    settings: &SyncSettings,
    today: NaiveDate,
) -> Result<SyncOutcome, SyncError> {
    let cached = cache.load()?;
    let cache_was_absent = cached.is_none();
    if cache_was_absent {
        info!(path = %cache.path().display(), "No cache found, fetching full history");
    }

    let last_published = last_publication_month(today, settings.publication_lag_months);
    let outcome = update_dataset(
        cached.unwrap_or_default(),
        source,
        settings.start_month,
        last_published,
    )
    .await?;

    let persisted = cache_was_absent || outcome.changed();
    if persisted {
        cache.save(&outcome.dataset)?;
    }

    let report = SyncReport {
        records: outcome.dataset.len(),
        months_fetched: outcome.fetched.len(),
        persisted,
        coverage: outcome.dataset.coverage(),
    };
    info!(
        records = report.records,
        months_fetched = report.months_fetched,
        persisted,
        "Sync complete"
    );

    Ok(SyncOutcome {
        dataset: outcome.dataset,
        report,
    })
}

/// Load the cache without touching the network. Absent is an empty dataset.
pub fn load_offline(cache: &CacheManager) -> Result<Dataset, SyncError> {
    Ok(cache.load()?.unwrap_or_default())
}
