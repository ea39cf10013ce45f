use std::future::Future;

use tracing::info;

use crate::error::SyncError;
use crate::models::{Dataset, Month, MonthlyBatch};

use super::ApiError;

/// Anything that can produce one month of incidents.
///
/// `ApiClient` is the production implementation; tests substitute an
/// in-memory source.
pub trait BatchSource {
    fn fetch_month(
        &self,
        month: Month,
    ) -> impl Future<Output = Result<MonthlyBatch, ApiError>> + Send;
}

/// Fetch every month from `start` through `end` (inclusive), one request at
/// a time, and concatenate the batches.
///
/// The first failing month aborts the whole fetch; nothing fetched so far is
/// returned.
pub async fn fetch_range<S: BatchSource>(
    source: &S,
    start: Month,
    end: Month,
) -> Result<Dataset, SyncError> {
    let months = Month::range_inclusive(start, end);
    let mut batches = Vec::with_capacity(months.len());

    for month in months {
        let batch = source
            .fetch_month(month)
            .await
            .map_err(|err| SyncError::Retrieval {
                month: month.key(),
                source: err,
            })?;
        info!(month = %month, records = batch.incidents.len(), "Fetched monthly batch");
        batches.push(batch);
    }

    Ok(Dataset::from_batches(batches))
}
