//! Delivery risk: file hotspots, ownership concentration, out-of-hours work
//! and a release-readiness verdict.

use chrono::{Datelike, Timelike, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::engine::{Analyzer, AnalyzerKind, Metrics};
use crate::config::AnalyticsConfig;
use crate::error::AnalyzerError;
use crate::types::{RangeAggregate, RiskLevel};
use crate::utils::round_to;

/// Working hours in UTC, `[start, end)`.
const WORKDAY_HOURS: std::ops::Range<u32> = 9..18;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hotspot {
    pub path: String,
    /// Commits touching the path
    pub changes: usize,
    pub authors: usize,
    /// Lines added plus deleted across those commits
    pub churn: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReadiness {
    Ready,
    Caution,
    #[default]
    AtRisk,
}

impl ReleaseReadiness {
    fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            ReleaseReadiness::Ready
        } else if score >= 40.0 {
            ReleaseReadiness::Caution
        } else {
            ReleaseReadiness::AtRisk
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskMetrics {
    pub hotspots: Vec<Hotspot>,
    pub single_owner_hotspots: usize,
    /// Largest single author's share of commits
    pub ownership_concentration: f64,
    pub weekend_ratio: f64,
    pub off_hours_ratio: f64,
    /// Lines deleted per line added
    pub churn_ratio: f64,
    /// 0 to 100, higher is riskier
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub readiness: ReleaseReadiness,
    /// 0 to 100, higher is better
    pub readiness_score: f64,
}

#[derive(Debug, Clone)]
pub struct RiskAnalyzer {
    pub hotspot_limit: usize,
    pub large_commit_lines: usize,
}

impl Default for RiskAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}

impl RiskAnalyzer {
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self {
            hotspot_limit: config.hotspot_limit,
            large_commit_lines: config.large_commit_lines,
        }
    }

    pub fn compute(&self, aggregate: &RangeAggregate) -> RiskMetrics {
        let total = aggregate.total_commits();
        if total == 0 {
            return RiskMetrics::default();
        }
        let ratio = |n: usize| n as f64 / total as f64;

        let hotspots = self.hotspots(aggregate);
        let single_owner_hotspots = hotspots.iter().filter(|h| h.authors == 1).count();

        let weekend = aggregate
            .commits
            .iter()
            .filter(|c| matches!(c.timestamp().weekday(), Weekday::Sat | Weekday::Sun))
            .count();
        let off_hours = aggregate
            .commits
            .iter()
            .filter(|c| !WORKDAY_HOURS.contains(&c.timestamp().hour()))
            .count();
        let large = aggregate
            .commits
            .iter()
            .filter(|c| c.lines_changed() > self.large_commit_lines)
            .count();

        let ownership_concentration = ratio(aggregate.authors.values().copied().max().unwrap_or(0));
        let churn_ratio = if aggregate.totals.lines_added == 0 {
            0.0
        } else {
            aggregate.totals.lines_deleted as f64 / aggregate.totals.lines_added as f64
        };
        let single_owner_share = if hotspots.is_empty() {
            0.0
        } else {
            single_owner_hotspots as f64 / hotspots.len() as f64
        };

        let risk_score = 100.0
            * (0.35 * ownership_concentration
                + 0.25 * single_owner_share
                + 0.15 * ratio(weekend)
                + 0.15 * ratio(off_hours)
                + 0.10 * churn_ratio.min(1.0));
        let risk_level = if risk_score >= 60.0 {
            RiskLevel::High
        } else if risk_score >= 30.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        let readiness_score = (100.0 - risk_score - 20.0 * ratio(large)).clamp(0.0, 100.0);

        RiskMetrics {
            hotspots,
            single_owner_hotspots,
            ownership_concentration: round_to(ownership_concentration, 4),
            weekend_ratio: round_to(ratio(weekend), 4),
            off_hours_ratio: round_to(ratio(off_hours), 4),
            churn_ratio: round_to(churn_ratio, 4),
            risk_score: round_to(risk_score, 1),
            risk_level,
            readiness: ReleaseReadiness::from_score(readiness_score),
            readiness_score: round_to(readiness_score, 1),
        }
    }

    /// Most frequently changed paths; ties go to higher churn, then path order.
    fn hotspots(&self, aggregate: &RangeAggregate) -> Vec<Hotspot> {
        let mut by_path: BTreeMap<&str, (usize, BTreeSet<&str>, usize)> = BTreeMap::new();
        for commit in &aggregate.commits {
            for file in commit.files() {
                let entry = by_path.entry(file.path.as_str()).or_default();
                entry.0 += 1;
                entry.1.insert(commit.author());
                entry.2 += file.lines_changed;
            }
        }

        let mut hotspots: Vec<Hotspot> = by_path
            .into_iter()
            .map(|(path, (changes, authors, churn))| Hotspot {
                path: path.to_string(),
                changes,
                authors: authors.len(),
                churn,
            })
            .collect();
        hotspots.sort_by(|a, b| {
            b.changes
                .cmp(&a.changes)
                .then_with(|| b.churn.cmp(&a.churn))
                .then_with(|| a.path.cmp(&b.path))
        });
        hotspots.truncate(self.hotspot_limit);
        hotspots
    }
}

impl Analyzer for RiskAnalyzer {
    fn name(&self) -> &'static str {
        "risk"
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Risk
    }

    fn analyze(&self, aggregate: &RangeAggregate) -> Result<Metrics, AnalyzerError> {
        Ok(Metrics::Risk(self.compute(aggregate)))
    }
}
