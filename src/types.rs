//! # Common Types
//!
//! This module contains the types shared by every stage of the pipeline:
//! the commit records a [`CommitSource`](crate::analysis::CommitSource) yields,
//! the [`RangeAggregate`] the aggregator builds from them, and the
//! [`AnalyticsReport`] the engine derives from an aggregate.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::analysis::collaboration::CollaborationMetrics;
use crate::analysis::quality::QualityMetrics;
use crate::analysis::risk::RiskMetrics;
use crate::analysis::time::TimeMetrics;
use crate::error::CommitError;

/// Line deltas for a single file touched by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    /// Repository-relative path of the file
    pub path: String,
    /// Number of lines added
    pub lines_added: usize,
    /// Number of lines deleted
    pub lines_deleted: usize,
    /// `lines_added + lines_deleted`
    pub lines_changed: usize,
}

impl FileChange {
    pub fn new(path: impl Into<String>, lines_added: usize, lines_deleted: usize) -> Self {
        Self {
            path: path.into(),
            lines_added,
            lines_deleted,
            lines_changed: lines_added + lines_deleted,
        }
    }

    /// Lowercased file extension, or `"no_extension"` for files without one.
    pub fn extension(&self) -> String {
        Path::new(&self.path)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "no_extension".to_string())
    }
}

/// A single commit as reported by a commit source.
///
/// Records are immutable once built. The per-commit totals are derived from
/// `files` unless they were supplied explicitly through [`CommitRecord::with_stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    id: String,
    author: String,
    timestamp: DateTime<Utc>,
    message: String,
    files: Vec<FileChange>,
    files_changed: usize,
    lines_added: usize,
    lines_deleted: usize,
}

impl CommitRecord {
    /// Build a record, failing when `id` is empty.
    ///
    /// Only the first line of `message` is kept.
    pub fn new(
        id: impl Into<String>,
        author: impl Into<String>,
        timestamp: DateTime<Utc>,
        message: &str,
        files: Vec<FileChange>,
    ) -> Result<Self, CommitError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CommitError::Invalid {
                reason: "commit id must not be empty".to_string(),
            });
        }

        let files_changed = files.len();
        let lines_added = files.iter().map(|f| f.lines_added).sum();
        let lines_deleted = files.iter().map(|f| f.lines_deleted).sum();

        Ok(Self {
            id,
            author: author.into(),
            timestamp,
            message: message.lines().next().unwrap_or_default().trim().to_string(),
            files,
            files_changed,
            lines_added,
            lines_deleted,
        })
    }

    /// Replace the derived totals with values supplied by the source.
    pub fn with_stats(mut self, files_changed: usize, lines_added: usize, lines_deleted: usize) -> Self {
        self.files_changed = files_changed;
        self.lines_added = lines_added;
        self.lines_deleted = lines_deleted;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// First line of the commit message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn files(&self) -> &[FileChange] {
        &self.files
    }

    pub fn files_changed(&self) -> usize {
        self.files_changed
    }

    pub fn lines_added(&self) -> usize {
        self.lines_added
    }

    pub fn lines_deleted(&self) -> usize {
        self.lines_deleted
    }

    pub fn lines_changed(&self) -> usize {
        self.lines_added + self.lines_deleted
    }

    /// Calendar day of the commit in UTC, formatted `YYYY-MM-DD`.
    pub fn day(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }
}

/// An inclusive UTC interval, `start <= end`.
///
/// Only [`DateParser::validate_date_range`](crate::dates::DateParser::validate_date_range)
/// builds ranges from user input; [`DateRange::new`] is for callers that
/// already hold validated timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Returns `None` when `end < start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }
}

/// Running totals over every commit in an aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub files_changed: usize,
    pub lines_added: usize,
    pub lines_deleted: usize,
}

impl Totals {
    pub fn record(&mut self, commit: &CommitRecord) {
        self.files_changed += commit.files_changed();
        self.lines_added += commit.lines_added();
        self.lines_deleted += commit.lines_deleted();
    }
}

/// The accumulated statistics for every commit in a range.
///
/// An aggregate is built once per query and is read-only from then on; the
/// engine shares it between analyzers behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeAggregate {
    /// Range start (inclusive)
    pub start: DateTime<Utc>,
    /// Range end (inclusive)
    pub end: DateTime<Utc>,
    /// Commits in source order (chronological)
    pub commits: Vec<CommitRecord>,
    /// Commit count per author
    pub authors: BTreeMap<String, usize>,
    /// Commit count per `YYYY-MM-DD` day
    pub commits_by_day: BTreeMap<String, usize>,
    /// Sums over `commits` unless overridden with [`RangeAggregate::with_totals`]
    pub totals: Totals,
    /// Commits the source listed but could not materialize
    pub skipped_commits: usize,
}

impl RangeAggregate {
    /// An aggregate over `range` with no commits yet.
    pub fn empty(range: DateRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
            commits: Vec::new(),
            authors: BTreeMap::new(),
            commits_by_day: BTreeMap::new(),
            totals: Totals::default(),
            skipped_commits: 0,
        }
    }

    /// Build an aggregate from already-materialized commits, in the given order.
    pub fn from_commits(range: DateRange, commits: impl IntoIterator<Item = CommitRecord>) -> Self {
        let mut aggregate = Self::empty(range);
        for commit in commits {
            aggregate.push(commit);
        }
        aggregate
    }

    /// Append one commit and update every running statistic from it.
    pub fn push(&mut self, commit: CommitRecord) {
        self.totals.record(&commit);
        *self.authors.entry(commit.author().to_string()).or_insert(0) += 1;
        *self.commits_by_day.entry(commit.day()).or_insert(0) += 1;
        self.commits.push(commit);
    }

    /// Override the running totals with externally supplied values.
    pub fn with_totals(mut self, totals: Totals) -> Self {
        self.totals = totals;
        self
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start,
            end: self.end,
        }
    }

    pub fn total_commits(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Average number of lines changed per commit
    pub fn average_commit_size(&self) -> f64 {
        if self.commits.is_empty() {
            return 0.0;
        }
        (self.totals.lines_added + self.totals.lines_deleted) as f64 / self.commits.len() as f64
    }

    /// Authors sorted by commit count (descending, then by name), truncated to `n`.
    pub fn top_contributors(&self, n: usize) -> Vec<(String, usize)> {
        let mut contributors: Vec<(String, usize)> =
            self.authors.iter().map(|(a, c)| (a.clone(), *c)).collect();
        contributors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        contributors.truncate(n);
        contributors
    }
}

/// A coarse fingerprint of an aggregate, used as the report cache key.
///
/// Two aggregates with the same commit count, bounds and author count share a
/// key even when their contents differ; a cache hit then returns the report
/// computed for the first one.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize)]
pub struct CacheKey {
    pub total_commits: usize,
    /// Range start, RFC 3339 with microseconds
    pub start: String,
    /// Range end, RFC 3339 with microseconds
    pub end: String,
    pub author_count: usize,
}

impl CacheKey {
    pub fn fingerprint(aggregate: &RangeAggregate) -> Self {
        Self {
            total_commits: aggregate.total_commits(),
            start: aggregate.start.to_rfc3339_opts(SecondsFormat::Micros, true),
            end: aggregate.end.to_rfc3339_opts(SecondsFormat::Micros, true),
            author_count: aggregate.authors.len(),
        }
    }
}

/// Coarse three-level risk rating.
///
/// The default is `High`: with no evidence of shared knowledge, nothing
/// supports a lower rating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    #[default]
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The merged output of every analyzer, in fixed order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub time: TimeMetrics,
    pub collaboration: CollaborationMetrics,
    pub quality: QualityMetrics,
    pub risk: RiskMetrics,
}
