use chrono::{DateTime, Utc};
use git2::{BranchType, DiffOptions, ErrorCode, Patch, Repository, Revwalk, Sort};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::analysis::source::CommitSource;
use crate::error::{CommitError, SourceError};
use crate::types::{CommitRecord, FileChange};

/// A commit source backed by a local git repository.
///
/// Walks the selected branch (HEAD when none is selected or the branch does
/// not exist) and diffs every commit against its first parent.
pub struct GitSource {
    repo: Mutex<Repository>,
    path: PathBuf,
    branch: Option<String>,
}

impl GitSource {
    /// Open the repository at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let repo = Repository::open(&path)?;
        Ok(Self {
            repo: Mutex::new(repo),
            path,
            branch: None,
        })
    }

    /// Walk `branch` instead of HEAD.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn repo(&self) -> MutexGuard<'_, Repository> {
        // Repository state is read-only here, so a poisoned lock is still usable
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_tip(&self, repo: &Repository, revwalk: &mut Revwalk<'_>) -> Result<(), git2::Error> {
        if let Some(branch) = &self.branch {
            if let Ok(branch_ref) = repo.find_branch(branch, BranchType::Local) {
                if let Some(ref_name) = branch_ref.get().name() {
                    return revwalk.push_ref(ref_name);
                }
            }
            debug!("branch {} not found, walking HEAD", branch);
        }
        revwalk.push_head()
    }
}

fn access_error(id: &str, e: git2::Error) -> CommitError {
    CommitError::Access {
        id: id.to_string(),
        reason: e.message().to_string(),
    }
}

impl CommitSource for GitSource {
    fn commit_ids_in_range(
        &self,
        start: DateTime<Utc>,
        end_exclusive: DateTime<Utc>,
    ) -> Result<Vec<String>, SourceError> {
        let repo = self.repo();
        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME | Sort::REVERSE)?;

        match self.push_tip(&repo, &mut revwalk) {
            Ok(()) => {}
            // A freshly initialized repository has no history yet
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        }

        let mut ids = Vec::new();
        for oid in revwalk {
            let oid = oid?;
            let commit = match repo.find_commit(oid) {
                Ok(commit) => commit,
                Err(e) => {
                    warn!("skipping unreadable commit {} while listing: {}", oid, e);
                    continue;
                }
            };
            let Some(timestamp) = DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0) else {
                warn!("skipping commit {} with out-of-range timestamp", oid);
                continue;
            };
            if start <= timestamp && timestamp < end_exclusive {
                ids.push(oid.to_string());
            }
        }
        Ok(ids)
    }

    fn commit(&self, id: &str) -> Result<CommitRecord, CommitError> {
        let repo = self.repo();
        let commit = repo
            .revparse_single(id)
            .and_then(|object| object.peel_to_commit())
            .map_err(|e| match e.code() {
                ErrorCode::NotFound | ErrorCode::InvalidSpec | ErrorCode::Ambiguous => {
                    CommitError::NotFound { id: id.to_string() }
                }
                _ => access_error(id, e),
            })?;

        let author = commit.author().name().unwrap_or("Unknown").to_string();
        let timestamp = DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0).ok_or_else(|| {
            CommitError::Access {
                id: id.to_string(),
                reason: "timestamp out of range".to_string(),
            }
        })?;
        let message = String::from_utf8_lossy(commit.message_bytes()).into_owned();

        let tree = commit.tree().map_err(|e| access_error(id, e))?;
        let parent_tree = if commit.parent_count() > 0 {
            Some(
                commit
                    .parent(0)
                    .and_then(|parent| parent.tree())
                    .map_err(|e| access_error(id, e))?,
            )
        } else {
            None
        };

        let mut diff_opts = DiffOptions::new();
        diff_opts.include_untracked(false).context_lines(0);
        let diff = repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut diff_opts))
            .map_err(|e| access_error(id, e))?;

        let delta_count = diff.deltas().len();
        let mut files = Vec::with_capacity(delta_count);
        for idx in 0..delta_count {
            let patch = match Patch::from_diff(&diff, idx) {
                Ok(Some(patch)) => patch,
                Ok(None) => {
                    debug!("{}: skipping binary or unchanged file #{}", id, idx);
                    continue;
                }
                Err(e) => {
                    debug!("{}: skipping undecodable file #{}: {}", id, idx, e);
                    continue;
                }
            };

            let delta = patch.delta();
            if delta.flags().is_binary() {
                debug!("{}: skipping binary file #{}", id, idx);
                continue;
            }
            let Some(path) = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().into_owned())
            else {
                continue;
            };

            match patch.line_stats() {
                Ok((_, added, deleted)) => files.push(FileChange::new(path, added, deleted)),
                Err(e) => debug!("{}: skipping {}: {}", id, path, e),
            }
        }

        CommitRecord::new(commit.id().to_string(), author, timestamp, &message, files)
    }
}
