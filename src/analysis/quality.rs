//! Commit hygiene metrics: sizes, message conventions, fixes and reverts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::analysis::engine::{Analyzer, AnalyzerKind, Metrics};
use crate::config::AnalyticsConfig;
use crate::error::AnalyzerError;
use crate::types::RangeAggregate;
use crate::utils::{median, round_to};

static CONVENTIONAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(feat|fix|docs|style|refactor|perf|test|build|ci|chore|revert)(\([^)]+\))?!?: \S")
        .expect("conventional commit pattern is valid")
});

static FIX_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(fix|fixes|fixed|bug|bugfix|hotfix)\b").expect("fix pattern is valid")
});

static REVERT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^revert\b").expect("revert pattern is valid"));

/// Messages shorter than this many characters count as uninformative.
pub const SHORT_MESSAGE_CHARS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub average_commit_size: f64,
    pub median_commit_size: f64,
    pub large_commits: usize,
    pub large_commit_ratio: f64,
    pub empty_commits: usize,
    pub conventional_commit_ratio: f64,
    pub short_message_ratio: f64,
    pub fix_ratio: f64,
    pub revert_count: usize,
    /// 0 to 100, higher is better
    pub quality_score: f64,
}

#[derive(Debug, Clone)]
pub struct QualityAnalyzer {
    pub large_commit_lines: usize,
}

impl Default for QualityAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}

impl QualityAnalyzer {
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self {
            large_commit_lines: config.large_commit_lines,
        }
    }

    pub fn compute(&self, aggregate: &RangeAggregate) -> QualityMetrics {
        let total = aggregate.total_commits();
        if total == 0 {
            return QualityMetrics::default();
        }

        let sizes: Vec<usize> = aggregate.commits.iter().map(|c| c.lines_changed()).collect();
        let large_commits = sizes.iter().filter(|&&s| s > self.large_commit_lines).count();
        let empty_commits = aggregate.commits.iter().filter(|c| c.files_changed() == 0).count();

        let mut conventional = 0usize;
        let mut short = 0usize;
        let mut fixes = 0usize;
        let mut revert_count = 0usize;
        for commit in &aggregate.commits {
            let subject = commit.message().trim();
            if CONVENTIONAL_PATTERN.is_match(subject) {
                conventional += 1;
            }
            if subject.chars().count() < SHORT_MESSAGE_CHARS {
                short += 1;
            }
            if FIX_PATTERN.is_match(subject) {
                fixes += 1;
            }
            if REVERT_PATTERN.is_match(subject) || subject.starts_with("revert:") {
                revert_count += 1;
            }
        }

        let ratio = |n: usize| n as f64 / total as f64;
        let large_commit_ratio = ratio(large_commits);
        let short_message_ratio = ratio(short);
        let conventional_commit_ratio = ratio(conventional);

        let penalty = 30.0 * large_commit_ratio
            + 25.0 * short_message_ratio
            + 20.0 * (1.0 - conventional_commit_ratio)
            + 15.0 * ratio(empty_commits)
            + 10.0 * ratio(revert_count);

        QualityMetrics {
            average_commit_size: round_to(aggregate.average_commit_size(), 2),
            median_commit_size: median(&sizes),
            large_commits,
            large_commit_ratio: round_to(large_commit_ratio, 4),
            empty_commits,
            conventional_commit_ratio: round_to(conventional_commit_ratio, 4),
            short_message_ratio: round_to(short_message_ratio, 4),
            fix_ratio: round_to(ratio(fixes), 4),
            revert_count,
            quality_score: round_to((100.0 - penalty).clamp(0.0, 100.0), 1),
        }
    }
}

impl Analyzer for QualityAnalyzer {
    fn name(&self) -> &'static str {
        "quality"
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Quality
    }

    fn analyze(&self, aggregate: &RangeAggregate) -> Result<Metrics, AnalyzerError> {
        Ok(Metrics::Quality(self.compute(aggregate)))
    }
}
