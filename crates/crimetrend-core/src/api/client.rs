//! HTTP client for the police.uk monthly crime data endpoint.
//!
//! One GET per calendar month against
//! `<base>/<force>/<area>/crime/<YYYY-MM>/data/`, returning a JSON array of
//! incident objects.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::Config;
use crate::models::{IncidentResponse, Month, MonthlyBatch};

use super::fetch::BatchSource;
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds, per monthly retrieval.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for one force/area pair.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    force: String,
    area_code: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(
        base_url: impl Into<String>,
        force: impl Into<String>,
        area_code: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            force: force.into(),
            area_code: area_code.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            config.base_url.as_str(),
            config.force.as_str(),
            config.area_code.as_str(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// URL for one month's batch
    pub fn batch_url(&self, month: Month) -> String {
        format!(
            "{}/{}/{}/crime/{}/data/",
            self.base_url,
            self.force,
            self.area_code,
            month.key()
        )
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Fetch and parse a single month. No retry: any failure is returned as-is.
    pub async fn fetch_batch(&self, month: Month) -> Result<MonthlyBatch, ApiError> {
        let url = self.batch_url(month);
        debug!(url = %url, "Requesting monthly batch");

        let response = self.client.get(&url).send().await?;
        let response = Self::check_response(response).await?;
        let body = response.text().await?;

        parse_batch(month, &body)
    }
}

impl BatchSource for ApiClient {
    async fn fetch_month(&self, month: Month) -> Result<MonthlyBatch, ApiError> {
        self.fetch_batch(month).await
    }
}

/// Parse a response body into a batch stamped with `month`.
/// An empty body is a month with no incidents.
pub fn parse_batch(month: Month, body: &str) -> Result<MonthlyBatch, ApiError> {
    if body.trim().is_empty() {
        return Ok(MonthlyBatch {
            month,
            incidents: Vec::new(),
        });
    }

    let parsed: Vec<IncidentResponse> =
        serde_json::from_str(body).map_err(|e| ApiError::parse(e, body))?;

    Ok(MonthlyBatch {
        month,
        incidents: parsed.iter().map(|r| r.to_incident(month)).collect(),
    })
}
