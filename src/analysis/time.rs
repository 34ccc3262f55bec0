//! Time-pattern metrics: velocity, activity heat-map, peak days and bus factor.

use chrono::{Datelike, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::analysis::engine::{Analyzer, AnalyzerKind, Metrics};
use crate::config::AnalyticsConfig;
use crate::error::AnalyzerError;
use crate::types::{RangeAggregate, RiskLevel};
use crate::utils::{mean, population_std_dev, round_to, weekly_buckets};

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Relative change between the halves of the window that counts as a trend
const TREND_CHANGE: f64 = 0.10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

/// A day and its commit count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeakPeriod {
    pub date: String,
    pub commits: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VelocityTrend {
    /// Commits per `YYYY-MM-DD` day
    pub daily_velocity: BTreeMap<String, usize>,
    /// Commits per ISO week, `YYYY-Www`
    pub weekly_velocity: BTreeMap<String, usize>,
    pub weekly_average: f64,
    /// Whole days between the first and last commit
    pub span_days: i64,
    pub trend: TrendDirection,
    /// Busiest day; the earliest one on ties
    pub peak: Option<PeakPeriod>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityHeatmap {
    /// Commits per weekday, Monday first
    pub by_weekday: [usize; 7],
    /// Commits per UTC hour of day
    pub by_hour: [usize; 24],
    pub peak_weekday: Option<String>,
    pub peak_hour: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributorShare {
    pub author: String,
    pub commits: usize,
    /// Cumulative share of all commits up to and including this author
    pub cumulative_share: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BusFactor {
    /// Smallest number of top authors whose commits reach `threshold`
    pub factor: usize,
    pub threshold: f64,
    pub risk: RiskLevel,
    /// The authors counted in `factor`, busiest first
    pub key_contributors: Vec<ContributorShare>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeMetrics {
    pub velocity: VelocityTrend,
    pub activity: ActivityHeatmap,
    /// Days at or above `mean + k * stddev`, busiest first
    pub peak_periods: Vec<PeakPeriod>,
    pub bus_factor: BusFactor,
}

#[derive(Debug, Clone)]
pub struct TimeAnalyzer {
    pub velocity_window_days: usize,
    pub peak_detection_k: f64,
    pub bus_factor_threshold: f64,
}

impl Default for TimeAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}

impl TimeAnalyzer {
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self {
            velocity_window_days: config.velocity_window_days,
            peak_detection_k: config.peak_detection_k,
            bus_factor_threshold: config.bus_factor_threshold,
        }
    }

    pub fn compute(&self, aggregate: &RangeAggregate) -> TimeMetrics {
        let mut daily: BTreeMap<String, usize> = BTreeMap::new();
        for commit in &aggregate.commits {
            *daily.entry(commit.day()).or_insert(0) += 1;
        }

        TimeMetrics {
            velocity: self.velocity_trend(aggregate, daily.clone()),
            activity: activity_heatmap(aggregate),
            peak_periods: self.peak_periods(&daily),
            bus_factor: self.bus_factor(&aggregate.authors),
        }
    }

    fn velocity_trend(&self, aggregate: &RangeAggregate, daily: BTreeMap<String, usize>) -> VelocityTrend {
        let first = aggregate.commits.iter().map(|c| c.timestamp()).min();
        let last = aggregate.commits.iter().map(|c| c.timestamp()).max();
        let span_days = match (first, last) {
            (Some(first), Some(last)) => (last - first).num_days(),
            _ => 0,
        };

        let total = aggregate.total_commits();
        let weekly_average = if total == 0 {
            0.0
        } else {
            total as f64 / span_days.max(1) as f64 * 7.0
        };

        let mut peak: Option<PeakPeriod> = None;
        for (date, &commits) in &daily {
            if peak.as_ref().map_or(true, |p| commits > p.commits) {
                peak = Some(PeakPeriod {
                    date: date.clone(),
                    commits,
                });
            }
        }

        VelocityTrend {
            weekly_velocity: weekly_buckets(&daily),
            trend: self.trend_direction(&daily),
            daily_velocity: daily,
            weekly_average,
            span_days,
            peak,
        }
    }

    fn trend_direction(&self, daily: &BTreeMap<String, usize>) -> TrendDirection {
        if daily.len() < self.velocity_window_days.max(2) {
            return TrendDirection::Stable;
        }

        let counts: Vec<f64> = daily.values().map(|&c| c as f64).collect();
        let (first_half, second_half) = counts.split_at(counts.len() / 2);
        let before = mean(first_half);
        let after = mean(second_half);
        if before <= 0.0 {
            return TrendDirection::Stable;
        }

        let change = (after - before) / before;
        if change > TREND_CHANGE {
            TrendDirection::Increasing
        } else if change < -TREND_CHANGE {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }

    fn peak_periods(&self, daily: &BTreeMap<String, usize>) -> Vec<PeakPeriod> {
        let counts: Vec<f64> = daily.values().map(|&c| c as f64).collect();
        let std_dev = population_std_dev(&counts);
        // A flat distribution has no peaks
        if std_dev <= f64::EPSILON {
            return Vec::new();
        }
        let threshold = mean(&counts) + self.peak_detection_k * std_dev;

        let mut peaks: Vec<PeakPeriod> = daily
            .iter()
            .filter(|(_, &count)| count as f64 >= threshold)
            .map(|(date, &commits)| PeakPeriod {
                date: date.clone(),
                commits,
            })
            .collect();
        peaks.sort_by(|a, b| b.commits.cmp(&a.commits).then_with(|| a.date.cmp(&b.date)));
        peaks
    }

    fn bus_factor(&self, authors: &BTreeMap<String, usize>) -> BusFactor {
        let total: usize = authors.values().sum();
        if total == 0 {
            return BusFactor {
                threshold: self.bus_factor_threshold,
                ..Default::default()
            };
        }

        let mut ranked: Vec<(&String, usize)> = authors.iter().map(|(a, &c)| (a, c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut cumulative = 0;
        let mut key_contributors = Vec::new();
        for (author, commits) in ranked {
            cumulative += commits;
            let share = cumulative as f64 / total as f64;
            key_contributors.push(ContributorShare {
                author: author.clone(),
                commits,
                cumulative_share: round_to(share, 4),
            });
            if share >= self.bus_factor_threshold {
                break;
            }
        }

        let factor = key_contributors.len();
        BusFactor {
            factor,
            threshold: self.bus_factor_threshold,
            risk: bus_factor_risk(factor),
            key_contributors,
        }
    }
}

fn bus_factor_risk(factor: usize) -> RiskLevel {
    match factor {
        0..=1 => RiskLevel::High,
        2..=3 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

fn activity_heatmap(aggregate: &RangeAggregate) -> ActivityHeatmap {
    let mut heatmap = ActivityHeatmap::default();
    for commit in &aggregate.commits {
        let ts = commit.timestamp();
        heatmap.by_weekday[ts.weekday().num_days_from_monday() as usize] += 1;
        heatmap.by_hour[ts.hour() as usize] += 1;
    }

    if !aggregate.commits.is_empty() {
        heatmap.peak_weekday = argmax(&heatmap.by_weekday).map(|i| WEEKDAYS[i].to_string());
        heatmap.peak_hour = argmax(&heatmap.by_hour).map(|i| i as u32);
    }
    heatmap
}

/// Index of the largest value; the first one on ties.
fn argmax(values: &[usize]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        if best.map_or(true, |b| v > values[b]) {
            best = Some(i);
        }
    }
    best
}

impl Analyzer for TimeAnalyzer {
    fn name(&self) -> &'static str {
        "time"
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Time
    }

    fn analyze(&self, aggregate: &RangeAggregate) -> Result<Metrics, AnalyzerError> {
        Ok(Metrics::Time(self.compute(aggregate)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommitRecord, DateRange};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn base() -> DateTime<Utc> {
        // A Monday
        Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap()
    }

    fn aggregate_from(entries: &[(&str, i64, u32)]) -> RangeAggregate {
        let commits = entries.iter().enumerate().map(|(i, (author, day, hour))| {
            CommitRecord::new(
                format!("c{i}"),
                *author,
                base() + Duration::days(*day) + Duration::hours(*hour as i64),
                "change",
                vec![],
            )
            .unwrap()
        });
        let range = DateRange::new(base() - Duration::days(1), base() + Duration::days(120)).unwrap();
        RangeAggregate::from_commits(range, commits)
    }

    fn authors(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(a, c)| (a.to_string(), *c)).collect()
    }

    #[test]
    fn test_bus_factor_single_dominant_author() {
        let bus = TimeAnalyzer::default().bus_factor(&authors(&[("A", 6), ("B", 3), ("C", 1)]));
        assert_eq!(bus.factor, 1);
        assert_eq!(bus.risk, RiskLevel::High);
        assert_eq!(bus.key_contributors[0].author, "A");
        assert_eq!(bus.key_contributors[0].cumulative_share, 0.6);
    }

    #[test]
    fn test_bus_factor_tiers() {
        let analyzer = TimeAnalyzer::default();
        let even = authors(&[("A", 17), ("B", 17), ("C", 16)]);
        let bus = analyzer.bus_factor(&even);
        assert_eq!(bus.factor, 2);
        assert_eq!(bus.risk, RiskLevel::Medium);

        let wide = authors(&[("A", 1), ("B", 1), ("C", 1), ("D", 1), ("E", 1), ("F", 1), ("G", 1), ("H", 1), ("I", 1), ("J", 1)]);
        let bus = analyzer.bus_factor(&wide);
        assert_eq!(bus.factor, 5);
        assert_eq!(bus.risk, RiskLevel::Low);
        // Ties rank by name
        let names: Vec<&str> = bus.key_contributors.iter().map(|c| c.author.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_bus_factor_empty() {
        let bus = TimeAnalyzer::default().bus_factor(&BTreeMap::new());
        assert_eq!(bus.factor, 0);
        assert_eq!(bus.risk, RiskLevel::High);
        assert_eq!(bus.threshold, 0.5);
    }

    #[test]
    fn test_empty_aggregate() {
        let metrics = TimeAnalyzer::default().compute(&aggregate_from(&[]));
        assert!(metrics.velocity.daily_velocity.is_empty());
        assert_eq!(metrics.velocity.weekly_average, 0.0);
        assert_eq!(metrics.velocity.trend, TrendDirection::Stable);
        assert_eq!(metrics.velocity.peak, None);
        assert_eq!(metrics.activity.peak_weekday, None);
        assert!(metrics.peak_periods.is_empty());
        assert_eq!(metrics.bus_factor.factor, 0);
        assert_eq!(metrics.bus_factor.risk, RiskLevel::High);
    }

    #[test]
    fn test_velocity_and_peak_tie_break() {
        let aggregate = aggregate_from(&[
            ("A", 0, 9),
            ("A", 0, 10),
            ("B", 3, 9),
            ("B", 3, 11),
            ("A", 14, 9),
        ]);
        let velocity = TimeAnalyzer::default().compute(&aggregate).velocity;

        assert_eq!(velocity.daily_velocity.len(), 3);
        assert_eq!(velocity.span_days, 14);
        assert_eq!(velocity.weekly_average, 2.5);
        assert_eq!(
            velocity.peak,
            Some(PeakPeriod {
                date: "2025-01-06".to_string(),
                commits: 2
            })
        );
        assert_eq!(velocity.weekly_velocity.values().sum::<usize>(), 5);
    }

    #[test]
    fn test_weekly_average_keeps_full_precision() {
        let aggregate = aggregate_from(&[("A", 0, 9), ("B", 1, 9), ("A", 2, 9), ("B", 3, 9)]);
        let velocity = TimeAnalyzer::default().compute(&aggregate).velocity;
        assert_eq!(velocity.span_days, 3);
        assert_eq!(velocity.weekly_average, 4.0 / 3.0 * 7.0);
        assert_ne!(velocity.weekly_average, 9.33);

        // A single day counts as one
        let same_day = aggregate_from(&[("A", 5, 9), ("A", 5, 15), ("B", 5, 20)]);
        assert_eq!(TimeAnalyzer::default().compute(&same_day).velocity.weekly_average, 21.0);
    }

    #[test]
    fn test_trend_requires_window() {
        // 13 distinct days, strongly increasing, still stable
        let mut entries: Vec<(&str, i64, u32)> = Vec::new();
        for day in 0..13i64 {
            for _ in 0..=day {
                entries.push(("A", day, 9));
            }
        }
        let metrics = TimeAnalyzer::default().compute(&aggregate_from(&entries));
        assert_eq!(metrics.velocity.trend, TrendDirection::Stable);
    }

    #[test]
    fn test_trend_directions() {
        let ramp = |rising: bool| {
            let mut entries: Vec<(&str, i64, u32)> = Vec::new();
            for day in 0..20i64 {
                let count = if (day < 10) == rising { 1 } else { 3 };
                for _ in 0..count {
                    entries.push(("A", day, 9));
                }
            }
            entries
        };
        let analyzer = TimeAnalyzer::default();
        assert_eq!(analyzer.compute(&aggregate_from(&ramp(true))).velocity.trend, TrendDirection::Increasing);
        assert_eq!(analyzer.compute(&aggregate_from(&ramp(false))).velocity.trend, TrendDirection::Decreasing);

        let flat: Vec<(&str, i64, u32)> = (0..20).map(|d| ("A", d, 9)).collect();
        assert_eq!(analyzer.compute(&aggregate_from(&flat)).velocity.trend, TrendDirection::Stable);
    }

    #[test]
    fn test_heatmap_counts_and_ties() {
        // Monday 09:00 twice, Tuesday 14:00 twice
        let aggregate = aggregate_from(&[("A", 0, 9), ("A", 0, 9), ("B", 1, 14), ("B", 1, 14)]);
        let activity = TimeAnalyzer::default().compute(&aggregate).activity;
        assert_eq!(activity.by_weekday[0], 2);
        assert_eq!(activity.by_weekday[1], 2);
        assert_eq!(activity.by_hour[9], 2);
        assert_eq!(activity.by_hour[14], 2);
        assert_eq!(activity.peak_weekday.as_deref(), Some("Monday"));
        assert_eq!(activity.peak_hour, Some(9));
    }

    #[test]
    fn test_peak_periods() {
        let mut entries: Vec<(&str, i64, u32)> = (0..10).map(|d| ("A", d, 9)).collect();
        for _ in 0..6 {
            entries.push(("B", 4, 12));
        }
        let peaks = TimeAnalyzer::default().compute(&aggregate_from(&entries)).peak_periods;
        assert_eq!(
            peaks,
            vec![PeakPeriod {
                date: "2025-01-10".to_string(),
                commits: 7
            }]
        );
    }

    #[test]
    fn test_flat_distribution_has_no_peaks() {
        let entries: Vec<(&str, i64, u32)> = (0..5).map(|d| ("A", d, 9)).collect();
        assert!(TimeAnalyzer::default().compute(&aggregate_from(&entries)).peak_periods.is_empty());
    }
}
