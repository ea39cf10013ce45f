use std::fmt;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A calendar month, always stored as the first day of that month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(NaiveDate);

impl Month {
    /// Normalize any date to the month containing it.
    pub fn from_date(date: NaiveDate) -> Self {
        // Day 1 exists in every month, so with_day(1) cannot fail
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn from_ymd(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    /// Parse `YYYY-MM` or `YYYY-MM-DD`. A full date is truncated to its month.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(Self::from_date(date));
        }
        let (year, month) = s.split_once('-')?;
        if month.len() != 2 {
            return None;
        }
        Self::from_ymd(year.parse().ok()?, month.parse().ok()?)
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// Retrieval key used in upstream URLs, e.g. `2024-03`.
    pub fn key(&self) -> String {
        self.0.format("%Y-%m").to_string()
    }

    pub fn succ(&self) -> Self {
        self.checked_add(1).unwrap_or(*self)
    }

    pub fn months_before(&self, n: u32) -> Self {
        self.0
            .checked_sub_months(Months::new(n))
            .map(Self)
            .unwrap_or(*self)
    }

    fn checked_add(&self, n: u32) -> Option<Self> {
        self.0.checked_add_months(Months::new(n)).map(Self)
    }

    /// Every month from `start` through `end`, one step per month.
    /// Empty when `start` is after `end`.
    pub fn range_inclusive(start: Month, end: Month) -> Vec<Month> {
        let mut months = Vec::new();
        let mut current = start;
        while current <= end {
            months.push(current);
            match current.checked_add(1) {
                Some(next) => current = next,
                None => break,
            }
        }
        months
    }

    /// Number of months from `self` to `other` (negative if `other` is earlier).
    pub fn months_until(&self, other: Month) -> i32 {
        (other.0.year() - self.0.year()) * 12 + other.0.month() as i32 - self.0.month() as i32
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Month::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid month: {}", s)))
    }
}
