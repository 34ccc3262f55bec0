//! Small numeric helpers shared by the analyzers.

use chrono::{Datelike, NaiveDate};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Arithmetic mean, 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().mean()
}

/// Population standard deviation, 0.0 for an empty slice.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().population_std_dev()
}

/// Median of unsorted counts, 0.0 for an empty slice.
pub fn median(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Fold `YYYY-MM-DD` day counts into ISO-week counts keyed `YYYY-Www`.
///
/// Keys that are not valid dates are ignored.
pub fn weekly_buckets(daily: &BTreeMap<String, usize>) -> BTreeMap<String, usize> {
    let mut weekly = BTreeMap::new();
    for (day, count) in daily {
        if let Ok(date) = NaiveDate::parse_from_str(day, "%Y-%m-%d") {
            let week = date.iso_week();
            *weekly
                .entry(format!("{}-W{:02}", week.year(), week.week()))
                .or_insert(0) += count;
        }
    }
    weekly
}
