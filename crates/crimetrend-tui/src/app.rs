//! Application state management for crimetrend.
//!
//! This module contains the core `App` struct: the loaded dataset, the
//! derived count tables, the current view and smoothing windows, and the
//! channel that background sync tasks report back through.

use anyhow::Result;
use chrono::Local;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crimetrend_core::stats::{CountTable, NormalizedTable};
use crimetrend_core::update::load_offline;
use crimetrend_core::{
    sync_dataset, ApiClient, CacheManager, CategoryGroup, Config, Dataset, SyncError,
    SyncOutcome, SyncSettings,
};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
/// Only one sync runs at a time, so a handful of slots is plenty.
const CHANNEL_BUFFER_SIZE: usize = 4;

/// Largest rolling window the `+` key will reach, in months.
pub const MAX_WINDOW: usize = 36;

// ============================================================================
// UI State Types
// ============================================================================

/// Chart views, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    AllCrime,
    TopCategories,
    FirstGroup,
    SecondGroup,
    GroupComparison,
}

impl View {
    pub const ALL: [View; 5] = [
        View::AllCrime,
        View::TopCategories,
        View::FirstGroup,
        View::SecondGroup,
        View::GroupComparison,
    ];

    /// Tab label. Group views take their name from the configured groups.
    pub fn label(&self, groups: &[CategoryGroup]) -> String {
        let group_name = |idx: usize, fallback: &str| {
            groups
                .get(idx)
                .map(|g| g.name.clone())
                .unwrap_or_else(|| fallback.to_string())
        };
        match self {
            View::AllCrime => "All crime".to_string(),
            View::TopCategories => "Top categories".to_string(),
            View::FirstGroup => group_name(0, "Group 1"),
            View::SecondGroup => group_name(1, "Group 2"),
            View::GroupComparison => match (groups.first(), groups.get(1)) {
                (Some(a), Some(b)) => format!(
                    "{} vs {}",
                    short_group_name(&a.name),
                    short_group_name(&b.name)
                ),
                _ => "Groups".to_string(),
            },
        }
    }

    /// Map a `1`-`5` key press to a view.
    pub fn from_digit(c: char) -> Option<Self> {
        let idx = c.to_digit(10)?.checked_sub(1)? as usize;
        Self::ALL.get(idx).copied()
    }

    /// Get the next view (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            View::AllCrime => View::TopCategories,
            View::TopCategories => View::FirstGroup,
            View::FirstGroup => View::SecondGroup,
            View::SecondGroup => View::GroupComparison,
            View::GroupComparison => View::AllCrime,
        }
    }

    /// Get the previous view (wrapping around)
    pub fn prev(&self) -> Self {
        match self {
            View::AllCrime => View::GroupComparison,
            View::TopCategories => View::AllCrime,
            View::FirstGroup => View::TopCategories,
            View::SecondGroup => View::FirstGroup,
            View::GroupComparison => View::SecondGroup,
        }
    }

    /// Raw-volume views use the short window; normalized views the long one.
    pub fn uses_short_window(&self) -> bool {
        matches!(self, View::AllCrime)
    }
}

/// "Against the person" -> "person"
fn short_group_name(name: &str) -> &str {
    name.rsplit(' ').next().unwrap_or(name)
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    Quitting,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Sent from the background sync task back to the main loop.
enum RefreshResult {
    Synced(SyncOutcome),
    Failed(String),
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    pub config: Config,
    cache: CacheManager,
    /// `None` in offline mode.
    api: Option<ApiClient>,
    settings: SyncSettings,

    pub state: AppState,
    pub view: View,
    pub short_window: usize,
    pub long_window: usize,

    pub dataset: Dataset,
    pub counts: CountTable,
    /// Per-category share of peak, rebuilt with the dataset.
    pub normalized: NormalizedTable,
    /// Per-group share of peak over the configured groups.
    pub group_normalized: NormalizedTable,

    pub syncing: bool,
    refresh_rx: mpsc::Receiver<RefreshResult>,
    refresh_tx: mpsc::Sender<RefreshResult>,

    pub status_message: Option<String>,
    pub cache_age: Option<String>,
}

impl App {
    /// Create the app from a validated config. No I/O beyond building the
    /// HTTP client; call `load_from_cache` next.
    pub fn new(config: Config, offline: bool) -> Result<Self> {
        config.validate()?;
        let settings = SyncSettings::from_config(&config)?;
        let cache = CacheManager::new(config.cache_path()?);
        let api = if offline {
            None
        } else {
            Some(ApiClient::from_config(&config)?)
        };

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let dataset = Dataset::new();
        let counts = CountTable::from_dataset(&dataset);
        let normalized = counts.normalized();
        let group_normalized = counts.group_totals(&config.category_groups).normalized();

        Ok(Self {
            short_window: config.short_window,
            long_window: config.long_window,
            config,
            cache,
            api,
            settings,

            state: AppState::Normal,
            view: View::AllCrime,

            dataset,
            counts,
            normalized,
            group_normalized,

            syncing: false,
            refresh_rx: rx,
            refresh_tx: tx,

            status_message: None,
            cache_age: None,
        })
    }

    pub fn is_offline(&self) -> bool {
        self.api.is_none()
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Load whatever is cached. A corrupt cache is an error for the caller.
    pub fn load_from_cache(&mut self) -> Result<(), SyncError> {
        let dataset = load_offline(&self.cache)?;
        info!(records = dataset.len(), "Loaded dataset from cache");
        self.set_dataset(dataset);
        Ok(())
    }

    /// Replace the dataset and rebuild the derived tables.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        self.counts = CountTable::from_dataset(&dataset);
        self.normalized = self.counts.normalized();
        self.group_normalized = self
            .counts
            .group_totals(&self.config.category_groups)
            .normalized();
        self.dataset = dataset;
        self.cache_age = self.cache.age_display();
    }

    // =========================================================================
    // Smoothing windows
    // =========================================================================

    /// Grow or shrink the current view's window, clamped to 1..=MAX_WINDOW.
    pub fn adjust_window(&mut self, delta: isize) {
        let window = if self.view.uses_short_window() {
            &mut self.short_window
        } else {
            &mut self.long_window
        };
        *window = window.saturating_add_signed(delta).clamp(1, MAX_WINDOW);
        self.status_message = Some(format!("Rolling window: {} months", *window));
    }

    // =========================================================================
    // Background Data Refresh
    // =========================================================================

    /// Spawn a background task that syncs the cache with the source.
    pub fn refresh_background(&mut self) {
        let Some(api) = self.api.clone() else {
            self.status_message = Some("Offline: showing cached data only".to_string());
            return;
        };
        if self.syncing {
            self.status_message = Some("Sync already in progress...".to_string());
            return;
        }

        info!("Starting background sync");
        let cache = self.cache.clone();
        let settings = self.settings;
        let tx = self.refresh_tx.clone();
        let today = Local::now().date_naive();

        tokio::spawn(async move {
            let result = match sync_dataset(&cache, &api, &settings, today).await {
                Ok(outcome) => RefreshResult::Synced(outcome),
                Err(e) => {
                    warn!(error = %e, "Background sync failed");
                    RefreshResult::Failed(e.to_string())
                }
            };
            if let Err(e) = tx.send(result).await {
                error!(error = %e, "Failed to send sync result - channel closed");
            }
        });

        self.syncing = true;
        self.status_message = Some("Syncing...".to_string());
    }

    /// Check for completed background tasks and process results
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.refresh_rx.try_recv() {
            self.process_refresh_result(result);
        }
    }

    fn process_refresh_result(&mut self, result: RefreshResult) {
        self.syncing = false;
        match result {
            RefreshResult::Synced(outcome) => {
                self.status_message = Some(format!("Synced: {}", outcome.report));
                self.set_dataset(outcome.dataset);
            }
            RefreshResult::Failed(message) => {
                self.status_message = Some(format!("Sync failed: {}", message));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crimetrend_core::models::default_groups;

    fn offline_app() -> App {
        let config = Config {
            cache_file: Some(std::env::temp_dir().join("crimetrend-app-test-missing.csv")),
            ..Config::default()
        };
        App::new(config, true).unwrap()
    }

    #[test]
    fn test_view_next() {
        assert_eq!(View::AllCrime.next(), View::TopCategories);
        assert_eq!(View::TopCategories.next(), View::FirstGroup);
        assert_eq!(View::FirstGroup.next(), View::SecondGroup);
        assert_eq!(View::SecondGroup.next(), View::GroupComparison);
        assert_eq!(View::GroupComparison.next(), View::AllCrime); // Wraps around
    }

    #[test]
    fn test_view_prev() {
        for view in View::ALL {
            assert_eq!(view.next().prev(), view);
        }
        assert_eq!(View::AllCrime.prev(), View::GroupComparison);
    }

    #[test]
    fn test_view_from_digit() {
        assert_eq!(View::from_digit('1'), Some(View::AllCrime));
        assert_eq!(View::from_digit('5'), Some(View::GroupComparison));
        assert_eq!(View::from_digit('0'), None);
        assert_eq!(View::from_digit('6'), None);
        assert_eq!(View::from_digit('x'), None);
    }

    #[test]
    fn test_view_labels_follow_groups() {
        let groups = default_groups();
        assert_eq!(View::FirstGroup.label(&groups), "Against the person");
        assert_eq!(View::SecondGroup.label(&groups), "Against property");
        assert_eq!(View::GroupComparison.label(&groups), "person vs property");
        assert_eq!(View::SecondGroup.label(&[]), "Group 2");
    }

    #[test]
    fn test_adjust_window_targets_active_view() {
        let mut app = offline_app();
        assert_eq!(app.short_window, 3);

        app.adjust_window(-1);
        app.adjust_window(-1);
        app.adjust_window(-1);
        assert_eq!(app.short_window, 1);
        assert_eq!(app.long_window, 12);

        app.view = View::TopCategories;
        app.adjust_window(100);
        assert_eq!(app.long_window, MAX_WINDOW);
        assert_eq!(app.short_window, 1);
    }

    #[test]
    fn test_offline_refresh_does_not_sync() {
        let mut app = offline_app();
        assert!(app.is_offline());
        app.refresh_background();
        assert!(!app.syncing);
        assert!(app.status_message.unwrap().starts_with("Offline"));
    }

    #[test]
    fn test_set_dataset_rebuilds_normalized_tables() {
        use crimetrend_core::{Incident, Month};

        let mut app = offline_app();
        let jan = Month::from_ymd(2024, 1).unwrap();
        let feb = Month::from_ymd(2024, 2).unwrap();
        app.set_dataset(Dataset::from_incidents(vec![
            Incident::new(jan, "Burglary", "a"),
            Incident::new(jan, "Burglary", "b"),
            Incident::new(feb, "Burglary", "c"),
            Incident::new(feb, "Robbery", "d"),
        ]));

        assert_eq!(app.normalized.get(jan, "Burglary"), Some(1.0));
        assert_eq!(app.normalized.get(feb, "Burglary"), Some(0.5));
        assert_eq!(app.group_normalized.get(feb, "Against the person"), Some(1.0));
        assert_eq!(app.group_normalized.get(jan, "Against property"), Some(1.0));
    }

    #[test]
    fn test_load_from_missing_cache_is_empty() {
        let mut app = offline_app();
        app.load_from_cache().unwrap();
        assert!(app.dataset.is_empty());
        assert!(app.counts.is_empty());
    }
}
