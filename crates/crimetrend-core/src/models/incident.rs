use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::category::display_label;
use super::month::Month;

/// One reported crime, stamped with the month of the batch it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incident {
    pub month: Month,
    pub category: String,
    pub location: String,
    /// Any other upstream columns, passed through to the cache untouched.
    /// Empty values are dropped.
    pub attributes: BTreeMap<String, String>,
}

impl Incident {
    pub fn new(month: Month, category: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            month,
            category: display_label(&category.into()),
            location: location.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.attributes.insert(key.into(), value);
        }
        self
    }
}

/// Incident object as returned by the crime data endpoint.
/// Only `category` and `location` are required.
#[derive(Debug, Deserialize)]
pub struct IncidentResponse {
    pub category: String,
    pub location: Value,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl IncidentResponse {
    pub fn to_incident(&self, month: Month) -> Incident {
        let mut incident = Incident::new(month, self.category.as_str(), value_text(&self.location));
        for (key, value) in &self.extra {
            incident = incident.with_attribute(key.as_str(), value_text(value));
        }
        incident
    }
}

/// Flatten a JSON value to a single CSV cell. Objects and arrays keep
/// their compact JSON form so nothing is lost.
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// The incidents retrieved for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyBatch {
    pub month: Month,
    pub incidents: Vec<Incident>,
}

/// All incidents accumulated across fetched and cached months.
///
/// `coverage` is the contiguous span of months the dataset speaks for. It
/// can extend past the last incident when trailing months came back empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    incidents: Vec<Incident>,
    coverage: Option<(Month, Month)>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from loaded incidents; coverage is the min..max month present.
    pub fn from_incidents(incidents: Vec<Incident>) -> Self {
        let coverage = incidents
            .iter()
            .map(|i| i.month)
            .fold(None, |span: Option<(Month, Month)>, month| match span {
                None => Some((month, month)),
                Some((lo, hi)) => Some((lo.min(month), hi.max(month))),
            });
        Self { incidents, coverage }
    }

    /// Concatenate batches in order. Each batch widens coverage, empty or not.
    pub fn from_batches(batches: Vec<MonthlyBatch>) -> Self {
        let mut incidents = Vec::new();
        let mut coverage: Option<(Month, Month)> = None;
        for batch in batches {
            coverage = Some(match coverage {
                None => (batch.month, batch.month),
                Some((lo, hi)) => (lo.min(batch.month), hi.max(batch.month)),
            });
            incidents.extend(batch.incidents);
        }
        Self { incidents, coverage }
    }

    /// Extend coverage to include `span`. Used when reloading a cache whose
    /// recorded coverage runs past its first or last incident.
    pub fn with_coverage(mut self, span: (Month, Month)) -> Self {
        let (lo, hi) = (span.0.min(span.1), span.0.max(span.1));
        self.coverage = Some(match self.coverage {
            None => (lo, hi),
            Some((a, b)) => (a.min(lo), b.max(hi)),
        });
        self
    }

    /// Append another dataset (typically freshly fetched trailing months).
    pub fn append(&mut self, other: Dataset) {
        self.coverage = match (self.coverage, other.coverage) {
            (None, span) | (span, None) => span,
            (Some((lo_a, hi_a)), Some((lo_b, hi_b))) => Some((lo_a.min(lo_b), hi_a.max(hi_b))),
        };
        self.incidents.extend(other.incidents);
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    pub fn coverage(&self) -> Option<(Month, Month)> {
        self.coverage
    }

    /// Latest month the dataset covers.
    pub fn latest_month(&self) -> Option<Month> {
        self.coverage.map(|(_, hi)| hi)
    }

    /// Every month in coverage, in order.
    pub fn months(&self) -> Vec<Month> {
        match self.coverage {
            Some((lo, hi)) => Month::range_inclusive(lo, hi),
            None => Vec::new(),
        }
    }
}
