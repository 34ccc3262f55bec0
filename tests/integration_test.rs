use chrono::{DateTime, TimeZone, Utc};
use git2::{Commit, Oid, Repository, Signature, Time};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use gitpulse::analysis::{AnalyticsEngine, CommitAggregator, CommitSource, GitSource};
use gitpulse::dates::end_of_day;
use gitpulse::{AggregateError, AnalyticsConfig, DateParser, RiskLevel, SourceError};

fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, month, day, hour, 0, 0).unwrap()
}

fn commit_files(
    repo: &Repository,
    files: &[(&str, &[u8])],
    author: &str,
    when: DateTime<Utc>,
    message: &str,
) -> Oid {
    let workdir = repo.workdir().unwrap();
    let mut index = repo.index().unwrap();
    for (path, content) in files {
        let full_path = workdir.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full_path, content).unwrap();
        index.add_path(Path::new(path)).unwrap();
    }
    index.write().unwrap();

    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let email = format!("{}@example.com", author.to_lowercase());
    let signature = Signature::new(author, &email, &Time::new(when.timestamp(), 0)).unwrap();
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap()
}

/// Four commits in January and one in February.
fn setup_test_repo() -> (TempDir, Repository) {
    let temp_dir = TempDir::new().unwrap();
    let repo = Repository::init(temp_dir.path()).unwrap();

    commit_files(&repo, &[("src/main.rs", b"fn main() {\n    run();\n}\n")], "Alice", at(1, 2, 10), "feat: initial import");
    commit_files(&repo, &[("README.md", b"# demo\n\nUsage notes\n")], "Bob", at(1, 5, 14), "docs: add readme\n\nLonger body text.");
    commit_files(&repo, &[("src/main.rs", b"fn main() {\n    run_all();\n}\n")], "Alice", at(1, 10, 9), "fix: call run_all");
    commit_files(&repo, &[("src/lib.rs", b"pub fn run_all() {}\n")], "Carol", at(1, 31, 23), "feat: add library");
    commit_files(&repo, &[("src/lib.rs", b"pub fn run_all() {}\npub fn later() {}\n")], "Bob", at(2, 20, 11), "feat: later work");

    (temp_dir, repo)
}

#[tokio::test]
async fn test_full_workflow() {
    let (temp_dir, _repo) = setup_test_repo();
    let parser = DateParser::at(at(3, 1, 0));
    let range = parser
        .validate_date_range(Some("2025-01-01".into()), Some("2025-01-31".into()))
        .unwrap();

    let source = GitSource::open(temp_dir.path()).unwrap();
    let aggregate = CommitAggregator::new().aggregate(&range, &source).unwrap();

    assert_eq!(aggregate.total_commits(), 4);
    assert_eq!(aggregate.skipped_commits, 0);
    assert_eq!(aggregate.authors.get("Alice"), Some(&2));
    assert_eq!(aggregate.authors.get("Bob"), Some(&1));
    assert_eq!(aggregate.authors.get("Carol"), Some(&1));
    // 3 + 3 + (1 added, 1 deleted) + 1
    assert_eq!(aggregate.totals.lines_added, 8);
    assert_eq!(aggregate.totals.lines_deleted, 1);
    assert_eq!(aggregate.commits[1].message(), "docs: add readme");

    let engine = AnalyticsEngine::new(&AnalyticsConfig::default());
    let report = engine.analyze(Arc::new(aggregate)).await;
    assert_eq!(report.time.bus_factor.factor, 1);
    assert_eq!(report.time.bus_factor.risk, RiskLevel::High);
    assert_eq!(report.quality.conventional_commit_ratio, 1.0);
    assert_eq!(report.risk.hotspots[0].path, "src/main.rs");
}

#[test]
fn test_range_end_covers_whole_day() {
    let (temp_dir, _repo) = setup_test_repo();
    let parser = DateParser::at(at(3, 1, 0));
    let source = GitSource::open(temp_dir.path()).unwrap();

    // Carol's commit lands at 23:00 on the 31st
    let range = parser
        .validate_date_range(Some("2025-01-31".into()), Some("2025-01-31".into()))
        .unwrap();
    let aggregate = CommitAggregator::new().aggregate(&range, &source).unwrap();
    let authors: Vec<&str> = aggregate.commits.iter().map(|c| c.author()).collect();
    assert_eq!(authors, vec!["Carol"]);

    let range = parser.validate_date_range(Some("2025-02-01".into()), None).unwrap();
    let aggregate = CommitAggregator::new().aggregate(&range, &source).unwrap();
    assert_eq!(aggregate.total_commits(), 1);
    assert_eq!(aggregate.commits[0].author(), "Bob");
}

#[test]
fn test_first_commit_counts_every_line() {
    let temp_dir = TempDir::new().unwrap();
    let repo = Repository::init(temp_dir.path()).unwrap();
    let oid = commit_files(
        &repo,
        &[("a.txt", b"one\ntwo\nthree\n"), ("b/c.txt", b"four\n")],
        "Alice",
        at(1, 2, 10),
        "feat: seed",
    );

    let source = GitSource::open(temp_dir.path()).unwrap();
    let commit = source.commit(&oid.to_string()).unwrap();
    assert_eq!(commit.id(), oid.to_string());
    assert_eq!(commit.files_changed(), 2);
    assert_eq!(commit.lines_added(), 4);
    assert_eq!(commit.lines_deleted(), 0);
    assert_eq!(commit.timestamp(), at(1, 2, 10));
}

#[test]
fn test_binary_files_are_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let repo = Repository::init(temp_dir.path()).unwrap();
    let oid = commit_files(
        &repo,
        &[("logo.bin", &[0u8, 159, 146, 150, 0, 1, 2, 3]), ("notes.txt", b"hello\n")],
        "Alice",
        at(1, 2, 10),
        "feat: assets",
    );

    let source = GitSource::open(temp_dir.path()).unwrap();
    let commit = source.commit(&oid.to_string()).unwrap();
    let paths: Vec<&str> = commit.files().iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["notes.txt"]);
    assert_eq!(commit.lines_added(), 1);
}

#[test]
fn test_unknown_commit_is_not_found() {
    let (temp_dir, _repo) = setup_test_repo();
    let source = GitSource::open(temp_dir.path()).unwrap();
    let err = source.commit("0123456789abcdef0123456789abcdef01234567").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_branch_selection() {
    let (temp_dir, repo) = setup_test_repo();
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    let first = head.parent(0).unwrap().parent(0).unwrap().parent(0).unwrap().parent(0).unwrap();
    repo.branch("early", &first, false).unwrap();

    let all_time = DateParser::at(at(3, 1, 0)).validate_date_range(None, None).unwrap();
    assert_eq!(all_time.end, end_of_day(at(3, 1, 0)));
    let source = GitSource::open(temp_dir.path()).unwrap().with_branch("early");
    let aggregate = CommitAggregator::new().aggregate(&all_time, &source).unwrap();
    assert_eq!(aggregate.total_commits(), 1);

    let fallback = GitSource::open(temp_dir.path()).unwrap().with_branch("no-such-branch");
    let aggregate = CommitAggregator::new().aggregate(&all_time, &fallback).unwrap();
    assert_eq!(aggregate.total_commits(), 5);
}

#[test]
fn test_missing_repository_is_unavailable() {
    let temp_dir = TempDir::new().unwrap();
    let err = GitSource::open(temp_dir.path().join("nope")).err().unwrap();
    assert!(matches!(err, SourceError::Unavailable { .. }));
}

#[tokio::test]
async fn test_walk_with_generous_timeout() {
    let (temp_dir, _repo) = setup_test_repo();
    let source: Arc<dyn CommitSource> = Arc::new(GitSource::open(temp_dir.path()).unwrap());
    let range = DateParser::at(at(3, 1, 12)).validate_date_range(None, None).unwrap();
    assert_eq!(range.end, end_of_day(at(3, 1, 12)));
    assert!(range.end > at(3, 1, 12));

    let result: Result<_, AggregateError> = CommitAggregator::new()
        .aggregate_with_timeout(range, source, std::time::Duration::from_secs(30))
        .await;
    assert_eq!(result.unwrap().total_commits(), 5);
}
