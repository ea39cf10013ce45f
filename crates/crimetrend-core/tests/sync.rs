//! Integration tests for the cache + incremental update pipeline.
//! These run `sync_dataset` end to end against a temp cache and an
//! in-memory source serving canned JSON bodies.

use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;

use chrono::NaiveDate;
use tempfile::TempDir;

use crimetrend_core::api::parse_batch;
use crimetrend_core::stats::CountTable;
use crimetrend_core::{
    sync_dataset, ApiError, BatchSource, CacheManager, Dataset, Month, MonthlyBatch, SyncError,
    SyncSettings,
};

fn m(year: i32, month: u32) -> Month {
    Month::from_ymd(year, month).unwrap()
}

fn day(year: i32, month: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, d).unwrap()
}

const TWO_INCIDENTS: &str = r#"[
    {"category": "burglary", "location": "On or near Station Road", "context": "", "id": 1},
    {"category": "anti-social-behaviour", "location": "On or near Park", "context": "", "id": 2}
]"#;

/// Serves fixed JSON bodies per month; months without a body get
/// `TWO_INCIDENTS`. Months in `failing` return a server error.
#[derive(Default)]
struct CannedSource {
    bodies: HashMap<Month, &'static str>,
    failing: Vec<Month>,
    requested: Mutex<Vec<Month>>,
}

impl CannedSource {
    fn requested(&self) -> Vec<Month> {
        self.requested.lock().unwrap().clone()
    }
}

impl BatchSource for CannedSource {
    async fn fetch_month(&self, month: Month) -> Result<MonthlyBatch, ApiError> {
        self.requested.lock().unwrap().push(month);
        if self.failing.contains(&month) {
            return Err(ApiError::ServerError("HTTP 503".to_string()));
        }
        parse_batch(month, self.bodies.get(&month).copied().unwrap_or(TWO_INCIDENTS))
    }
}

fn record_months(dataset: &Dataset) -> Vec<Month> {
    dataset.incidents().iter().map(|i| i.month).collect()
}

fn settings(start: Month) -> SyncSettings {
    SyncSettings {
        start_month: start,
        publication_lag_months: 2,
    }
}

#[tokio::test]
async fn cold_sync_then_reload_round_trips() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::new(dir.path().join("gloucestershire").join("all_crime.csv"));
    let source = CannedSource::default();

    let outcome = sync_dataset(&cache, &source, &settings(m(2023, 11)), day(2024, 3, 20))
        .await
        .unwrap();
    assert_eq!(source.requested(), vec![m(2023, 11), m(2023, 12), m(2024, 1)]);
    assert!(outcome.report.persisted);

    let reloaded = cache.load().unwrap().unwrap();
    assert_eq!(reloaded.len(), outcome.dataset.len());
    assert_eq!(record_months(&reloaded), record_months(&outcome.dataset));
    assert_eq!(reloaded.incidents()[1].category, "Anti-social behaviour");
    assert_eq!(reloaded.incidents()[0].attributes.get("id").map(String::as_str), Some("1"));
}

#[tokio::test]
async fn incremental_sync_fetches_only_trailing_months() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::new(dir.path().join("all_crime.csv"));
    fs::write(
        cache.path(),
        "date,category,location\n\
         2023-12-01,Burglary,On or near A\n\
         2024-01-01,Drugs,On or near B\n",
    )
    .unwrap();
    let source = CannedSource::default();

    let outcome = sync_dataset(&cache, &source, &settings(m(2015, 8)), day(2024, 5, 1))
        .await
        .unwrap();

    assert_eq!(source.requested(), vec![m(2024, 2), m(2024, 3)]);
    assert_eq!(outcome.dataset.latest_month(), Some(m(2024, 3)));
    assert_eq!(outcome.report.records, 6);
    assert!(outcome.report.persisted);
    assert_eq!(cache.load().unwrap().unwrap().latest_month(), Some(m(2024, 3)));
}

#[tokio::test]
async fn second_sync_on_same_day_fetches_nothing() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::new(dir.path().join("all_crime.csv"));
    let today = day(2024, 5, 1);

    let first = CannedSource::default();
    sync_dataset(&cache, &first, &settings(m(2024, 1)), today)
        .await
        .unwrap();

    let second = CannedSource::default();
    let outcome = sync_dataset(&cache, &second, &settings(m(2024, 1)), today)
        .await
        .unwrap();

    assert!(second.requested().is_empty());
    assert_eq!(outcome.report.months_fetched, 0);
    assert!(!outcome.report.persisted);
}

#[tokio::test]
async fn failed_month_leaves_existing_cache_untouched() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::new(dir.path().join("all_crime.csv"));
    let original = "date,category,location\n2024-01-01,Drugs,On or near B\n";
    fs::write(cache.path(), original).unwrap();

    let source = CannedSource {
        failing: vec![m(2024, 3)],
        ..Default::default()
    };
    let err = sync_dataset(&cache, &source, &settings(m(2015, 8)), day(2024, 5, 1))
        .await
        .unwrap_err();

    match err {
        SyncError::Retrieval { month, .. } => assert_eq!(month, "2024-03"),
        other => panic!("expected retrieval failure, got {:?}", other),
    }
    assert_eq!(fs::read_to_string(cache.path()).unwrap(), original);
}

#[tokio::test]
async fn empty_month_counts_as_zero_for_every_category() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::new(dir.path().join("all_crime.csv"));
    let source = CannedSource {
        bodies: HashMap::from([(m(2024, 2), "")]),
        ..Default::default()
    };

    let outcome = sync_dataset(&cache, &source, &settings(m(2024, 1)), day(2024, 5, 1))
        .await
        .unwrap();
    let table = CountTable::from_dataset(&outcome.dataset);

    assert_eq!(table.months(), &[m(2024, 1), m(2024, 2), m(2024, 3)]);
    for category in table.categories() {
        assert_eq!(table.get(m(2024, 2), category), Some(0));
        assert_eq!(table.get(m(2024, 3), category), Some(1));
    }
}

#[tokio::test]
async fn empty_trailing_month_is_not_fetched_again() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::new(dir.path().join("all_crime.csv"));
    let today = day(2024, 5, 1);

    let first = CannedSource {
        bodies: HashMap::from([(m(2024, 3), "[]")]),
        ..Default::default()
    };
    sync_dataset(&cache, &first, &settings(m(2024, 1)), today)
        .await
        .unwrap();
    let written = fs::read_to_string(cache.path()).unwrap();

    let second = CannedSource::default();
    let outcome = sync_dataset(&cache, &second, &settings(m(2024, 1)), today)
        .await
        .unwrap();

    assert!(second.requested().is_empty());
    assert!(!outcome.report.persisted);
    assert_eq!(outcome.report.months_fetched, 0);
    assert_eq!(outcome.dataset.latest_month(), Some(m(2024, 3)));
    assert_eq!(fs::read_to_string(cache.path()).unwrap(), written);
}

#[tokio::test]
async fn all_empty_history_is_not_scraped_twice() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::new(dir.path().join("all_crime.csv"));
    let today = day(2024, 5, 1);
    let empty = HashMap::from([(m(2024, 1), "[]"), (m(2024, 2), "[]"), (m(2024, 3), "[]")]);

    let first = CannedSource {
        bodies: empty.clone(),
        ..Default::default()
    };
    let outcome = sync_dataset(&cache, &first, &settings(m(2024, 1)), today)
        .await
        .unwrap();
    assert_eq!(first.requested().len(), 3);
    assert!(outcome.report.persisted);
    assert!(outcome.dataset.is_empty());

    let second = CannedSource {
        bodies: empty,
        ..Default::default()
    };
    let outcome = sync_dataset(&cache, &second, &settings(m(2024, 1)), today)
        .await
        .unwrap();

    assert!(second.requested().is_empty());
    assert!(!outcome.report.persisted);
    assert_eq!(outcome.report.coverage, Some((m(2024, 1), m(2024, 3))));
}

#[tokio::test]
async fn later_month_after_empty_tail_is_appended() {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::new(dir.path().join("all_crime.csv"));

    let first = CannedSource {
        bodies: HashMap::from([(m(2024, 3), "")]),
        ..Default::default()
    };
    sync_dataset(&cache, &first, &settings(m(2024, 1)), day(2024, 5, 1))
        .await
        .unwrap();

    // A month later only 2024-04 is new
    let second = CannedSource::default();
    let outcome = sync_dataset(&cache, &second, &settings(m(2024, 1)), day(2024, 6, 1))
        .await
        .unwrap();

    assert_eq!(second.requested(), vec![m(2024, 4)]);
    assert!(outcome.report.persisted);
    assert_eq!(outcome.report.coverage, Some((m(2024, 1), m(2024, 4))));
    assert_eq!(cache.load().unwrap().unwrap().latest_month(), Some(m(2024, 4)));
}
