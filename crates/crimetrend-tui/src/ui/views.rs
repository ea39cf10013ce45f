//! Chart view-models.
//!
//! Each view turns the count table into a set of plotted series. Nothing here
//! touches the terminal, so the numbers behind every chart are unit tested.

use crimetrend_core::stats::{CountTable, NormalizedTable, SmoothedTable};
use crimetrend_core::CategoryGroup;

use crate::app::View;

/// Settings that shape the charts, taken from the app.
pub struct ChartSettings<'a> {
    pub short_window: usize,
    pub long_window: usize,
    pub top_categories: &'a [String],
    pub groups: &'a [CategoryGroup],
    /// `counts.normalized()`, built once per dataset.
    pub normalized: &'a NormalizedTable,
    /// Group totals normalized per group, built once per dataset.
    pub group_normalized: &'a NormalizedTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    /// (month index, value). Months before the window fills are omitted.
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub title: String,
    /// Stacked series hold cumulative values, bottom layer first.
    pub series: Vec<Series>,
    pub stacked: bool,
    pub x_max: f64,
    pub y_max: f64,
    pub x_labels: Vec<String>,
    pub y_label: &'static str,
}

impl ChartView {
    pub fn has_data(&self) -> bool {
        self.series.iter().any(|s| !s.points.is_empty())
    }
}

pub fn build_chart(view: View, counts: &CountTable, settings: &ChartSettings) -> ChartView {
    let window = if view.uses_short_window() {
        settings.short_window
    } else {
        settings.long_window
    };
    let label = view.label(settings.groups);

    let (series, stacked, y_label) = match view {
        View::AllCrime => {
            // Largest categories at the bottom of the stack
            let order = counts.top_categories(counts.categories().len());
            let smoothed = counts.select(&order).rolling_mean(window);
            (stack(&smoothed), true, "incidents / month")
        }
        View::TopCategories => {
            let smoothed = settings
                .normalized
                .select(settings.top_categories)
                .rolling_mean(window);
            (lines(&smoothed), false, "share of peak")
        }
        View::FirstGroup | View::SecondGroup => {
            let idx = if view == View::FirstGroup { 0 } else { 1 };
            let series = match settings.groups.get(idx) {
                Some(group) => lines(
                    &settings
                        .normalized
                        .select(&group.categories)
                        .rolling_mean(window),
                ),
                None => Vec::new(),
            };
            (series, false, "share of peak")
        }
        View::GroupComparison => {
            let smoothed = settings.group_normalized.rolling_mean(window);
            (lines(&smoothed), false, "share of peak")
        }
    };

    let y_max = series
        .iter()
        .flat_map(|s| s.points.iter().map(|(_, y)| *y))
        .fold(0.0_f64, f64::max);

    ChartView {
        title: format!("{} ({}-month rolling mean)", label, window),
        series,
        stacked,
        x_max: counts.months().len().saturating_sub(1) as f64,
        y_max: if y_max > 0.0 { y_max } else { 1.0 },
        x_labels: x_labels(counts),
        y_label,
    }
}

/// One line per category.
fn lines(table: &SmoothedTable) -> Vec<Series> {
    table
        .categories()
        .iter()
        .map(|name| Series {
            name: name.clone(),
            points: table
                .column(name)
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .filter_map(|(x, y)| y.map(|y| (x as f64, y)))
                .collect(),
        })
        .collect()
}

/// Cumulative layers: layer `k` is the sum of columns `0..=k`.
fn stack(table: &SmoothedTable) -> Vec<Series> {
    let mut running: Vec<Option<f64>> = vec![Some(0.0); table.rows().len()];
    table
        .categories()
        .iter()
        .enumerate()
        .map(|(col, name)| {
            for (acc, row) in running.iter_mut().zip(table.rows()) {
                *acc = match (*acc, row[col]) {
                    (Some(a), Some(v)) => Some(a + v),
                    _ => None,
                };
            }
            Series {
                name: name.clone(),
                points: running
                    .iter()
                    .enumerate()
                    .filter_map(|(x, y)| y.map(|y| (x as f64, y)))
                    .collect(),
            }
        })
        .collect()
}

/// First, middle and last month keys.
fn x_labels(counts: &CountTable) -> Vec<String> {
    let months = counts.months();
    match months.len() {
        0 => Vec::new(),
        1 => vec![months[0].key()],
        n => vec![months[0].key(), months[n / 2].key(), months[n - 1].key()],
    }
}
