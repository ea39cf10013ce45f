//! Application configuration management.
//!
//! This module handles loading the application configuration:
//! which force and area to fetch, where the series starts, the publication
//! lag, the cache location, and the chart windows and category lists.
//!
//! Configuration is stored at `~/.config/crimetrend/config.json`. Selected
//! fields can be overridden from the environment (or a `.env` file loaded by
//! the binary):
//!
//! - `CRIMETREND_BASE_URL`
//! - `CRIMETREND_FORCE`
//! - `CRIMETREND_AREA`
//! - `CRIMETREND_CACHE_FILE`

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::REQUEST_TIMEOUT_SECS;
use crate::error::ConfigError;
use crate::models::{default_groups, validate_groups, CategoryGroup, Month, TOP_CATEGORIES};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "crimetrend";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Cache file name inside the per-area cache directory
pub const CACHE_FILE: &str = "all_crime.csv";

/// Months between the end of a month and its data being considered stable.
pub const DEFAULT_PUBLICATION_LAG_MONTHS: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub force: String,
    pub area_code: String,
    /// Earliest month to fetch on a cold cache, `YYYY-MM`.
    pub start_month: String,
    pub publication_lag_months: u32,
    pub request_timeout_secs: u64,
    /// Explicit cache path; otherwise derived from the cache directory.
    pub cache_file: Option<PathBuf>,
    /// Rolling window for raw-volume charts.
    pub short_window: usize,
    /// Rolling window for normalized trend charts.
    pub long_window: usize,
    pub top_categories: Vec<String>,
    pub category_groups: Vec<CategoryGroup>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://www.police.uk".to_string(),
            force: "gloucestershire".to_string(),
            area_code: "CA1".to_string(),
            start_month: "2015-08".to_string(),
            publication_lag_months: DEFAULT_PUBLICATION_LAG_MONTHS,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            cache_file: None,
            short_window: 3,
            long_window: 12,
            top_categories: TOP_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            category_groups: default_groups(),
        }
    }
}

impl Config {
    /// Load from disk (or defaults), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Override fields from `lookup` (the process environment in production).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("CRIMETREND_BASE_URL") {
            self.base_url = url;
        }
        if let Some(force) = non_empty("CRIMETREND_FORCE") {
            self.force = force;
        }
        if let Some(area) = non_empty("CRIMETREND_AREA") {
            self.area_code = area;
        }
        if let Some(file) = non_empty("CRIMETREND_CACHE_FILE") {
            self.cache_file = Some(PathBuf::from(file));
        }
    }

    /// Check everything that would otherwise fail later in the run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.start_month()?;
        if self.short_window == 0 || self.long_window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        validate_groups(&self.category_groups)
    }

    pub fn start_month(&self) -> Result<Month, ConfigError> {
        Month::parse(&self.start_month)
            .ok_or_else(|| ConfigError::InvalidStartMonth(self.start_month.clone()))
    }

    /// Cache file location: explicit `cache_file`, else
    /// `<cache dir>/crimetrend/<force>/<area>/all_crime.csv`.
    pub fn cache_path(&self) -> Result<PathBuf> {
        if let Some(ref file) = self.cache_file {
            return Ok(file.clone());
        }

        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir
            .join(APP_NAME)
            .join(&self.force)
            .join(&self.area_code)
            .join(CACHE_FILE))
    }

    /// Directory for the log file written while the TUI owns the terminal.
    pub fn log_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
