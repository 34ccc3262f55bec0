//! Walks a date range through a [`CommitSource`] and folds the commits into a
//! [`RangeAggregate`].
//!
//! The walk is sequential: commit order decides map insertion order and every
//! tie-break downstream. Commits that cannot be materialized are logged and
//! skipped; only a source that cannot list commits at all aborts the walk.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;

use crate::analysis::source::CommitSource;
use crate::dates::start_of_day;
use crate::error::AggregateError;
use crate::types::{DateRange, RangeAggregate};

#[derive(Debug, Clone, Default)]
pub struct CommitAggregator {
    cancel: Option<CancellationToken>,
}

impl CommitAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the walk between commits once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Exclusive upper bound handed to the source: midnight after `end`'s day.
    pub fn end_exclusive(range: &DateRange) -> DateTime<Utc> {
        let day_start = start_of_day(range.end);
        day_start
            .checked_add_signed(Duration::days(1))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn aggregate(
        &self,
        range: &DateRange,
        source: &dyn CommitSource,
    ) -> Result<RangeAggregate, AggregateError> {
        let started = Instant::now();
        let end_exclusive = Self::end_exclusive(range);
        let ids = source.commit_ids_in_range(range.start, end_exclusive)?;
        debug!(
            "source listed {} commits in [{}, {})",
            ids.len(),
            range.start,
            end_exclusive
        );

        let mut aggregate = RangeAggregate::empty(*range);
        for id in &ids {
            if self.is_cancelled() {
                return Err(AggregateError::Cancelled {
                    processed: aggregate.total_commits(),
                });
            }

            match source.commit(id) {
                Ok(commit) => aggregate.push(commit),
                Err(e) => {
                    warn!("skipping commit {}: {}", id, e);
                    aggregate.skipped_commits += 1;
                }
            }
        }

        info!(
            "aggregated {} commits ({} skipped) from {} authors in {:.2}s",
            aggregate.total_commits(),
            aggregate.skipped_commits,
            aggregate.authors.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(aggregate)
    }

    /// Run [`aggregate`](Self::aggregate) on the blocking pool with a wall-clock ceiling.
    ///
    /// On expiry the walk is cancelled before it reaches its next commit. The
    /// walk runs on a child of the caller's token, so a timeout never cancels
    /// the caller's token itself.
    pub async fn aggregate_with_timeout(
        &self,
        range: DateRange,
        source: Arc<dyn CommitSource>,
        limit: std::time::Duration,
    ) -> Result<RangeAggregate, AggregateError> {
        let token = match &self.cancel {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let walker = Self {
            cancel: Some(token.clone()),
        };

        let task = spawn_blocking(move || walker.aggregate(&range, source.as_ref()));
        match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined.map_err(|e| AggregateError::Task(e.to_string()))?,
            Err(_) => {
                token.cancel();
                Err(AggregateError::TimedOut(limit))
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|token| token.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::source::MemorySource;
    use crate::error::{CommitError, SourceError};
    use crate::types::{CommitRecord, FileChange};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap()
    }

    fn commit(id: &str, author: &str, ts: DateTime<Utc>, files: Vec<FileChange>) -> CommitRecord {
        CommitRecord::new(id, author, ts, "change", files).unwrap()
    }

    fn january() -> DateRange {
        DateRange::new(at(1, 0), crate::dates::end_of_day(at(31, 0))).unwrap()
    }

    #[test]
    fn test_end_exclusive_is_next_midnight() {
        let range = DateRange::new(at(1, 0), at(10, 15)).unwrap();
        assert_eq!(CommitAggregator::end_exclusive(&range), at(11, 0));
    }

    #[test]
    fn test_aggregate_accumulates_in_source_order() {
        let source = MemorySource::new(vec![
            commit("c2", "Bob", at(3, 14), vec![FileChange::new("b.rs", 4, 1)]),
            commit("c1", "Alice", at(2, 9), vec![FileChange::new("a.rs", 10, 0), FileChange::new("a.md", 2, 2)]),
            commit("c3", "Alice", at(3, 18), vec![]),
            commit("late", "Carol", at(31, 23), vec![FileChange::new("c.rs", 1, 0)]),
            commit("feb", "Dave", Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(), vec![]),
        ]);

        let aggregate = CommitAggregator::new().aggregate(&january(), &source).unwrap();

        let ids: Vec<&str> = aggregate.commits.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3", "late"]);
        assert_eq!(aggregate.authors.get("Alice"), Some(&2));
        assert_eq!(aggregate.authors.values().sum::<usize>(), aggregate.total_commits());
        assert_eq!(aggregate.commits_by_day.get("2025-01-03"), Some(&2));
        assert_eq!(aggregate.totals.files_changed, 4);
        assert_eq!(aggregate.totals.lines_added, 17);
        assert_eq!(aggregate.totals.lines_deleted, 3);
        assert_eq!(aggregate.skipped_commits, 0);
    }

    #[test]
    fn test_commit_failures_are_skipped() {
        let source = MemorySource::new(vec![
            commit("c1", "Alice", at(2, 9), vec![FileChange::new("a.rs", 1, 0)]),
            commit("c2", "Bob", at(3, 9), vec![FileChange::new("b.rs", 5, 0)]),
            commit("c3", "Carol", at(4, 9), vec![FileChange::new("c.rs", 7, 0)]),
        ])
        .with_missing("c2")
        .with_unreadable("c3");

        let aggregate = CommitAggregator::new().aggregate(&january(), &source).unwrap();
        assert_eq!(aggregate.total_commits(), 1);
        assert_eq!(aggregate.skipped_commits, 2);
        assert_eq!(aggregate.totals.lines_added, 1);
        assert!(aggregate.total_commits() <= 3);
    }

    #[test]
    fn test_unavailable_source_is_fatal() {
        let source = MemorySource::new(vec![]).unavailable("not a git repository");
        let err = CommitAggregator::new().aggregate(&january(), &source).unwrap_err();
        assert!(matches!(err, AggregateError::Source(SourceError::Unavailable { .. })));
    }

    #[test]
    fn test_cancelled_walk_stops() {
        let token = CancellationToken::new();
        token.cancel();
        let source = MemorySource::new(vec![commit("c1", "Alice", at(2, 9), vec![])]);
        let err = CommitAggregator::new()
            .with_cancellation(token)
            .aggregate(&january(), &source)
            .unwrap_err();
        assert!(matches!(err, AggregateError::Cancelled { processed: 0 }));
    }

    struct SlowSource;

    impl CommitSource for SlowSource {
        fn commit_ids_in_range(
            &self,
            _start: DateTime<Utc>,
            _end_exclusive: DateTime<Utc>,
        ) -> Result<Vec<String>, SourceError> {
            Ok((0..50).map(|i| format!("c{i}")).collect())
        }

        fn commit(&self, id: &str) -> Result<CommitRecord, CommitError> {
            std::thread::sleep(std::time::Duration::from_millis(20));
            CommitRecord::new(id, "Alice", at(2, 9), "slow", vec![])
        }
    }

    #[tokio::test]
    async fn test_timeout_cancels_walk() {
        let result = CommitAggregator::new()
            .aggregate_with_timeout(january(), Arc::new(SlowSource), std::time::Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(AggregateError::TimedOut(_))));
    }

    #[tokio::test]
    async fn test_timeout_leaves_caller_token_alone() {
        let token = CancellationToken::new();
        let result = CommitAggregator::new()
            .with_cancellation(token.clone())
            .aggregate_with_timeout(january(), Arc::new(SlowSource), std::time::Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(AggregateError::TimedOut(_))));
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_caller_cancellation_reaches_timed_walk() {
        let token = CancellationToken::new();
        token.cancel();
        let source = MemorySource::new(vec![commit("c1", "Alice", at(2, 9), vec![])]);
        let result = CommitAggregator::new()
            .with_cancellation(token)
            .aggregate_with_timeout(january(), Arc::new(source), std::time::Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(AggregateError::Cancelled { processed: 0 })));
    }

    #[tokio::test]
    async fn test_timeout_not_reached() {
        let source = MemorySource::new(vec![commit("c1", "Alice", at(2, 9), vec![])]);
        let aggregate = CommitAggregator::new()
            .aggregate_with_timeout(january(), Arc::new(source), std::time::Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(aggregate.total_commits(), 1);
    }
}
