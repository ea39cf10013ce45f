use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CacheError;
use crate::models::{Dataset, Incident, Month};

/// Column holding the batch month, written as `YYYY-MM-DD` (first of month).
pub const DATE_COLUMN: &str = "date";
pub const CATEGORY_COLUMN: &str = "category";
pub const LOCATION_COLUMN: &str = "location";

const RESERVED_COLUMNS: [&str; 3] = [DATE_COLUMN, CATEGORY_COLUMN, LOCATION_COLUMN];

/// Suffix of the sidecar file recording the span of months the CSV covers.
pub const COVERAGE_SUFFIX: &str = ".coverage.json";

/// Months that came back empty leave no rows in the CSV, so the fetched
/// span is kept next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct CoverageRecord {
    first: Month,
    last: Month,
}

/// Reads and writes the local CSV copy of the dataset.
///
/// Single-process only: there is no locking, and concurrent runs against the
/// same path may race on the final rename.
#[derive(Debug, Clone)]
pub struct CacheManager {
    path: PathBuf,
}

impl CacheManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached dataset.
    ///
    /// `Ok(None)` means there is no cache file yet. A file that exists but
    /// cannot be parsed is an error; there is no automatic recovery. Coverage
    /// is the span of the incidents, widened by the coverage sidecar when
    /// one exists.
    pub fn load(&self) -> Result<Option<Dataset>, CacheError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No cache file");
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .map_err(|source| CacheError::Read {
                path: self.path.clone(),
                source,
            })?;

        let headers = reader
            .headers()
            .map_err(|source| CacheError::Read {
                path: self.path.clone(),
                source,
            })?
            .clone();

        let column = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| CacheError::MissingColumn {
                    path: self.path.clone(),
                    column: name,
                })
        };
        let date_idx = column(DATE_COLUMN)?;
        let category_idx = column(CATEGORY_COLUMN)?;
        let location_idx = column(LOCATION_COLUMN)?;

        // Unnamed columns (e.g. a dataframe index) are dropped
        let attribute_columns: Vec<(usize, &str)> = headers
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty() && !RESERVED_COLUMNS.contains(name))
            .collect();

        let mut incidents = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| CacheError::Corrupt {
                path: self.path.clone(),
                line: e.position().map(|p| p.line()).unwrap_or(0),
                message: e.to_string(),
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let field = |idx: usize| record.get(idx).unwrap_or("");

            let month = Month::parse(field(date_idx)).ok_or_else(|| CacheError::Corrupt {
                path: self.path.clone(),
                line,
                message: format!("invalid date '{}'", field(date_idx)),
            })?;

            let mut incident = Incident::new(month, field(category_idx), field(location_idx));
            for (idx, name) in &attribute_columns {
                incident = incident.with_attribute(*name, field(*idx));
            }
            incidents.push(incident);
        }

        let mut dataset = Dataset::from_incidents(incidents);
        if let Some(record) = self.load_coverage()? {
            dataset = dataset.with_coverage((record.first, record.last));
        }

        debug!(
            path = %self.path.display(),
            records = dataset.len(),
            coverage = ?dataset.coverage(),
            "Loaded cache"
        );
        Ok(Some(dataset))
    }

    fn load_coverage(&self) -> Result<Option<CoverageRecord>, CacheError> {
        let path = self.coverage_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).map_err(|e| CacheError::Read {
            path: path.clone(),
            source: e.into(),
        })?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| CacheError::Coverage { path, source })
    }

    /// Write the dataset, replacing any existing file.
    ///
    /// Writes to a sibling `.tmp` file and renames it into place, so a failed
    /// write never leaves a truncated cache behind.
    pub fn save(&self, dataset: &Dataset) -> Result<(), CacheError> {
        let write_err = |source| CacheError::Write {
            path: self.path.clone(),
            source,
        };
        let encode_err = |source| CacheError::Encode {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let attribute_names: BTreeSet<&str> = dataset
            .incidents()
            .iter()
            .flat_map(|i| i.attributes.keys().map(String::as_str))
            .filter(|name| !RESERVED_COLUMNS.contains(name))
            .collect();

        let tmp_path = self.tmp_path();
        let file = File::create(&tmp_path).map_err(write_err)?;
        let mut writer = csv::Writer::from_writer(file);

        let mut header: Vec<&str> = RESERVED_COLUMNS.to_vec();
        header.extend(attribute_names.iter().copied());
        writer.write_record(&header).map_err(encode_err)?;

        for incident in dataset.incidents() {
            let date = incident.month.first_day().format("%Y-%m-%d").to_string();
            let mut row: Vec<&str> = vec![
                date.as_str(),
                incident.category.as_str(),
                incident.location.as_str(),
            ];
            row.extend(
                attribute_names
                    .iter()
                    .map(|name| incident.attributes.get(*name).map(String::as_str).unwrap_or("")),
            );
            writer.write_record(&row).map_err(encode_err)?;
        }
        writer.flush().map_err(write_err)?;
        drop(writer);

        fs::rename(&tmp_path, &self.path).map_err(write_err)?;
        self.save_coverage(dataset.coverage())?;
        debug!(path = %self.path.display(), records = dataset.len(), "Saved cache");
        Ok(())
    }

    /// Write (or, for an empty span, remove) the coverage sidecar.
    fn save_coverage(&self, coverage: Option<(Month, Month)>) -> Result<(), CacheError> {
        let path = self.coverage_path();
        let write_err = |source| CacheError::Write {
            path: path.clone(),
            source,
        };

        let Some((first, last)) = coverage else {
            if path.exists() {
                fs::remove_file(&path).map_err(write_err)?;
            }
            return Ok(());
        };

        let contents = serde_json::to_string_pretty(&CoverageRecord { first, last }).map_err(
            |source| CacheError::Coverage {
                path: path.clone(),
                source,
            },
        )?;
        let tmp_path = self.sibling(&format!("{}.tmp", COVERAGE_SUFFIX));
        fs::write(&tmp_path, contents).map_err(write_err)?;
        fs::rename(&tmp_path, &path).map_err(write_err)?;
        Ok(())
    }

    /// Path of the coverage sidecar, e.g. `all_crime.csv.coverage.json`.
    pub fn coverage_path(&self) -> PathBuf {
        self.sibling(COVERAGE_SUFFIX)
    }

    fn tmp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    /// Last time the cache file was written, if it exists.
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        let modified = fs::metadata(&self.path).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified))
    }

    /// Human-readable cache age for the status bar, `None` without a cache.
    pub fn age_display(&self) -> Option<String> {
        self.modified_at()
            .map(|at| format_age((Utc::now() - at).num_minutes()))
    }
}

/// Format an age in minutes as "just now", "5m ago", "2h ago" or "3d ago".
pub fn format_age(minutes: i64) -> String {
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        let remaining_mins = minutes % 60;
        if remaining_mins >= 30 {
            // Round up: 1h 30m+ becomes 2h
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        let remaining_hours = (minutes % 1440) / 60;
        if remaining_hours >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MonthlyBatch;
    use tempfile::TempDir;

    fn m(year: i32, month: u32) -> Month {
        Month::from_ymd(year, month).unwrap()
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(-5), "just now");
        assert_eq!(format_age(0), "just now");
        assert_eq!(format_age(5), "5m ago");
        assert_eq!(format_age(89), "1h ago");
        assert_eq!(format_age(90), "2h ago");
        assert_eq!(format_age(1440), "1d ago");
        assert_eq!(format_age(1440 + 12 * 60), "2d ago");
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path().join("all_crime.csv"));
        assert!(cache.load().unwrap().is_none());
        assert!(cache.age_display().is_none());
    }

    #[test]
    fn test_load_missing_date_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all_crime.csv");
        fs::write(&path, "category,location\nBurglary,Somewhere\n").unwrap();

        let err = CacheManager::new(&path).load().unwrap_err();
        assert!(matches!(err, CacheError::MissingColumn { column: "date", .. }));
    }

    #[test]
    fn test_load_bad_date_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all_crime.csv");
        fs::write(&path, "date,category,location\nyesterday,Burglary,Somewhere\n").unwrap();

        let err = CacheManager::new(&path).load().unwrap_err();
        match err {
            CacheError::Corrupt { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("yesterday"));
            }
            other => panic!("expected corrupt error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_ragged_row_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all_crime.csv");
        fs::write(&path, "date,category,location\n2020-01-01,Burglary\n").unwrap();

        let err = CacheManager::new(&path).load().unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[test]
    fn test_load_dataframe_export_with_index_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all_crime.csv");
        fs::write(
            &path,
            ",category,context,date,location\n\
             0,anti-social-behaviour,,2015-08-01,On or near X\n\
             1,Burglary,,2015-09-01,On or near Y\n",
        )
        .unwrap();

        let dataset = CacheManager::new(&path).load().unwrap().unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.incidents()[0].category, "Anti-social behaviour");
        assert_eq!(dataset.coverage(), Some((m(2015, 8), m(2015, 9))));
        assert!(dataset.incidents()[0].attributes.is_empty());
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("all_crime.csv");
        let cache = CacheManager::new(&path);

        let first = Dataset::from_batches(vec![MonthlyBatch {
            month: m(2024, 1),
            incidents: vec![
                Incident::new(m(2024, 1), "Burglary", "a"),
                Incident::new(m(2024, 1), "Drugs", "b"),
            ],
        }]);
        cache.save(&first).unwrap();

        let second = Dataset::from_incidents(vec![Incident::new(m(2024, 2), "Robbery", "c")]);
        cache.save(&second).unwrap();

        let loaded = cache.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.incidents()[0].month, m(2024, 2));
        assert!(!cache.tmp_path().exists());
        assert_eq!(cache.age_display().as_deref(), Some("just now"));
    }

    #[test]
    fn test_empty_trailing_month_survives_reload() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path().join("all_crime.csv"));
        let dataset = Dataset::from_batches(vec![
            MonthlyBatch {
                month: m(2024, 1),
                incidents: vec![Incident::new(m(2024, 1), "Burglary", "a")],
            },
            MonthlyBatch {
                month: m(2024, 2),
                incidents: vec![],
            },
        ]);
        cache.save(&dataset).unwrap();

        let text = fs::read_to_string(cache.coverage_path()).unwrap();
        assert!(text.contains("\"2024-02\""));
        let loaded = cache.load().unwrap().unwrap();
        assert_eq!(loaded.coverage(), Some((m(2024, 1), m(2024, 2))));
    }

    #[test]
    fn test_header_only_cache_keeps_coverage() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path().join("all_crime.csv"));
        let dataset = Dataset::from_batches(vec![MonthlyBatch {
            month: m(2024, 3),
            incidents: vec![],
        }]);
        cache.save(&dataset).unwrap();

        let loaded = cache.load().unwrap().unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.latest_month(), Some(m(2024, 3)));

        // Saving a dataset with no coverage removes the sidecar
        cache.save(&Dataset::new()).unwrap();
        assert!(!cache.coverage_path().exists());
        assert_eq!(cache.load().unwrap().unwrap().coverage(), None);
    }

    #[test]
    fn test_invalid_coverage_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(dir.path().join("all_crime.csv"));
        fs::write(cache.path(), "date,category,location\n").unwrap();
        fs::write(cache.coverage_path(), "{\"first\": \"soon\"}").unwrap();

        let err = cache.load().unwrap_err();
        assert!(matches!(err, CacheError::Coverage { .. }));
    }

    #[test]
    fn test_save_writes_first_of_month_dates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all_crime.csv");
        let cache = CacheManager::new(&path);
        let dataset = Dataset::from_incidents(vec![
            Incident::new(m(2024, 3), "Burglary", "On or near \"Quoted\", Road")
                .with_attribute("id", "42"),
        ]);
        cache.save(&dataset).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("date,category,location,id"));
        assert!(lines.next().unwrap().starts_with("2024-03-01,Burglary,"));

        let loaded = cache.load().unwrap().unwrap();
        assert_eq!(loaded.incidents(), dataset.incidents());
    }
}
