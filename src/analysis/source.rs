//! The boundary to whatever stores the commit history.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::error::{CommitError, SourceError};
use crate::types::CommitRecord;

/// A supplier of commit records.
///
/// Range listing is cheap and returns ids only; each commit is then
/// materialized on its own so that one unreadable commit does not sink the
/// whole walk.
pub trait CommitSource: Send + Sync {
    /// Ids of every commit with `start <= timestamp < end_exclusive`, oldest first.
    fn commit_ids_in_range(
        &self,
        start: DateTime<Utc>,
        end_exclusive: DateTime<Utc>,
    ) -> Result<Vec<String>, SourceError>;

    /// Materialize a single commit with its per-file line counts.
    fn commit(&self, id: &str) -> Result<CommitRecord, CommitError>;
}

/// An in-memory commit source.
///
/// Commits are kept in timestamp order and indexed by id. When an id repeats,
/// the earliest commit wins. Ids can be marked missing or unreadable to
/// simulate a damaged history.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    commits: Vec<CommitRecord>,
    index: HashMap<String, usize>,
    missing: HashSet<String>,
    unreadable: HashSet<String>,
    unavailable: Option<String>,
}

impl MemorySource {
    pub fn new(commits: impl IntoIterator<Item = CommitRecord>) -> Self {
        let mut commits: Vec<CommitRecord> = commits.into_iter().collect();
        // Stable, so commits sharing a timestamp keep insertion order
        commits.sort_by_key(|c| c.timestamp());
        let mut index = HashMap::with_capacity(commits.len());
        for (position, commit) in commits.iter().enumerate() {
            index.entry(commit.id().to_string()).or_insert(position);
        }
        Self {
            commits,
            index,
            ..Default::default()
        }
    }

    /// List `id` in ranges but report it as not found when loaded.
    pub fn with_missing(mut self, id: impl Into<String>) -> Self {
        self.missing.insert(id.into());
        self
    }

    /// List `id` in ranges but fail to read it.
    pub fn with_unreadable(mut self, id: impl Into<String>) -> Self {
        self.unreadable.insert(id.into());
        self
    }

    /// Make every range listing fail.
    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.unavailable = Some(reason.into());
        self
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

impl CommitSource for MemorySource {
    fn commit_ids_in_range(
        &self,
        start: DateTime<Utc>,
        end_exclusive: DateTime<Utc>,
    ) -> Result<Vec<String>, SourceError> {
        if let Some(reason) = &self.unavailable {
            return Err(SourceError::Unavailable {
                reason: reason.clone(),
            });
        }
        Ok(self
            .commits
            .iter()
            .filter(|c| start <= c.timestamp() && c.timestamp() < end_exclusive)
            .map(|c| c.id().to_string())
            .collect())
    }

    fn commit(&self, id: &str) -> Result<CommitRecord, CommitError> {
        if self.missing.contains(id) {
            return Err(CommitError::NotFound { id: id.to_string() });
        }
        if self.unreadable.contains(id) {
            return Err(CommitError::Access {
                id: id.to_string(),
                reason: "object is corrupt".to_string(),
            });
        }
        self.index
            .get(id)
            .and_then(|&position| self.commits.get(position))
            .cloned()
            .ok_or_else(|| CommitError::NotFound { id: id.to_string() })
    }
}
