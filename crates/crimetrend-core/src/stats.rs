//! Month × category aggregation of a dataset.
//!
//! `CountTable` is the pivot of incident counts: one row per month in the
//! dataset's coverage, one column per category (sorted by name). A
//! (month, category) pair with no incidents is zero, and a covered month with
//! no incidents at all is a row of zeros.
//!
//! Derived tables are rebuilt from the dataset on every run and never cached.

use std::collections::{BTreeSet, HashMap};

use crate::models::{CategoryGroup, Dataset, Month};

/// A value that can be averaged.
pub trait CellValue: Copy {
    fn to_f64(self) -> f64;
}

impl CellValue for u64 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl CellValue for f64 {
    fn to_f64(self) -> f64 {
        self
    }
}

/// Month-indexed, category-columned table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<T> {
    months: Vec<Month>,
    categories: Vec<String>,
    rows: Vec<Vec<T>>,
}

pub type CountTable = Table<u64>;
pub type NormalizedTable = Table<f64>;
/// Rolling-mean output; `None` until the window has filled.
pub type SmoothedTable = Table<Option<f64>>;

impl<T: Copy> Table<T> {
    pub fn months(&self) -> &[Month] {
        &self.months
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn rows(&self) -> &[Vec<T>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty() || self.categories.is_empty()
    }

    fn category_index(&self, category: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == category)
    }

    pub fn get(&self, month: Month, category: &str) -> Option<T> {
        let row = self.months.iter().position(|m| *m == month)?;
        let col = self.category_index(category)?;
        Some(self.rows[row][col])
    }

    /// One category's series across all months.
    pub fn column(&self, category: &str) -> Option<Vec<T>> {
        let col = self.category_index(category)?;
        Some(self.rows.iter().map(|row| row[col]).collect())
    }

    /// Restrict to `categories`, in the order given. Unknown names are skipped.
    pub fn select<S: AsRef<str>>(&self, categories: &[S]) -> Table<T> {
        let picked: Vec<(usize, String)> = categories
            .iter()
            .filter_map(|c| {
                self.category_index(c.as_ref())
                    .map(|idx| (idx, c.as_ref().to_string()))
            })
            .collect();

        Table {
            months: self.months.clone(),
            categories: picked.iter().map(|(_, name)| name.clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| picked.iter().map(|(idx, _)| row[*idx]).collect())
                .collect(),
        }
    }

    fn map_columns<U: Copy>(&self, mut f: impl FnMut(&[T]) -> Vec<U>) -> Table<U> {
        let columns: Vec<Vec<U>> = (0..self.categories.len())
            .map(|col| {
                let series: Vec<T> = self.rows.iter().map(|row| row[col]).collect();
                f(&series)
            })
            .collect();

        let rows = (0..self.months.len())
            .map(|row| columns.iter().map(|series| series[row]).collect())
            .collect();

        Table {
            months: self.months.clone(),
            categories: self.categories.clone(),
            rows,
        }
    }
}

impl<T: CellValue> Table<T> {
    /// Trailing rolling mean over `window` months (a window of 0 acts as 1).
    pub fn rolling_mean(&self, window: usize) -> SmoothedTable {
        let window = window.max(1);
        self.map_columns(|series| rolling_mean(series, window))
    }
}

/// Trailing mean: element `i` averages `series[i + 1 - window ..= i]`.
pub fn rolling_mean<T: CellValue>(series: &[T], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..series.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                let slice = &series[i + 1 - window..=i];
                Some(slice.iter().map(|v| v.to_f64()).sum::<f64>() / window as f64)
            }
        })
        .collect()
}

impl CountTable {
    /// Group by (category, month) and count.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let months = dataset.months();
        let categories: Vec<String> = dataset
            .incidents()
            .iter()
            .map(|i| i.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let month_idx: HashMap<Month, usize> =
            months.iter().enumerate().map(|(i, m)| (*m, i)).collect();
        let cat_idx: HashMap<&str, usize> = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut rows = vec![vec![0u64; categories.len()]; months.len()];
        for incident in dataset.incidents() {
            if let (Some(&r), Some(&c)) = (
                month_idx.get(&incident.month),
                cat_idx.get(incident.category.as_str()),
            ) {
                rows[r][c] += 1;
            }
        }

        Self {
            months,
            categories,
            rows,
        }
    }

    /// Total incidents per category over all months, in column order.
    pub fn category_totals(&self) -> Vec<(String, u64)> {
        self.categories
            .iter()
            .enumerate()
            .map(|(col, name)| (name.clone(), self.rows.iter().map(|row| row[col]).sum()))
            .collect()
    }

    /// The `n` highest-volume categories, largest first (ties by name).
    pub fn top_categories(&self, n: usize) -> Vec<String> {
        let mut totals = self.category_totals();
        totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        totals.into_iter().take(n).map(|(name, _)| name).collect()
    }

    /// Divide each column by its own maximum. All-zero columns stay zero.
    pub fn normalized(&self) -> NormalizedTable {
        self.map_columns(|series| {
            let max = series.iter().copied().max().unwrap_or(0);
            if max == 0 {
                vec![0.0; series.len()]
            } else {
                series.iter().map(|v| *v as f64 / max as f64).collect()
            }
        })
    }

    /// Sum each group's categories per month; one column per group.
    pub fn group_totals(&self, groups: &[CategoryGroup]) -> CountTable {
        let members: Vec<Vec<usize>> = groups
            .iter()
            .map(|g| {
                g.categories
                    .iter()
                    .filter_map(|c| self.category_index(c))
                    .collect()
            })
            .collect();

        Table {
            months: self.months.clone(),
            categories: groups.iter().map(|g| g.name.clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| {
                    members
                        .iter()
                        .map(|cols| cols.iter().map(|c| row[*c]).sum())
                        .collect()
                })
                .collect(),
        }
    }
}
