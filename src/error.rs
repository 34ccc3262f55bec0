//! Error types for every stage of the pipeline.
//!
//! Parsing and range errors are always returned to the caller. Commit-level
//! errors are fatal only for single-commit lookups; the aggregator logs and
//! skips them. Analyzer errors never leave the engine.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Why a date expression could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("expression is empty")]
    Empty,
    #[error("expected `now`, `<N><d|w|m|y>`, `YYYY-MM-DD` or `YYYY-MM-DD HH:MM[:SS]`")]
    UnrecognizedFormat,
    #[error("relative magnitude must be a positive integer")]
    InvalidMagnitude,
    #[error("unknown unit `{0}`, expected one of d, w, m, y")]
    InvalidUnit(String),
    #[error("not a valid calendar date or time")]
    InvalidCalendarDate,
    #[error("year {0} is outside the supported range 2000-2100")]
    YearOutOfRange(i32),
    #[error("timezone annotations are not accepted: timestamps are naive and always interpreted as UTC")]
    TimezoneNotAllowed,
    #[error("resulting timestamp is out of range")]
    OutOfRange,
}

/// A user-supplied date expression could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date expression `{input}`: {reason}")]
pub struct DateParseError {
    pub input: String,
    pub reason: ParseFailure,
}

impl DateParseError {
    pub(crate) fn new(input: &str, reason: ParseFailure) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// A resolved range violates `start <= end`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date range: start `{start}` ({resolved_start}) is after end `{end}` ({resolved_end})")]
pub struct DateRangeError {
    /// Start endpoint as given by the caller
    pub start: String,
    /// End endpoint as given by the caller
    pub end: String,
    pub resolved_start: DateTime<Utc>,
    pub resolved_end: DateTime<Utc>,
}

/// Errors from [`DateParser::validate_date_range`](crate::dates::DateParser::validate_date_range).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error(transparent)]
    Parse(#[from] DateParseError),
    #[error(transparent)]
    Range(#[from] DateRangeError),
}

/// A single commit could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    #[error("commit `{id}` not found")]
    NotFound { id: String },
    #[error("commit `{id}` could not be read: {reason}")]
    Access { id: String, reason: String },
    #[error("invalid commit record: {reason}")]
    Invalid { reason: String },
}

impl CommitError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CommitError::NotFound { .. })
    }
}

/// The commit source cannot enumerate commits at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("commit source unavailable: {reason}")]
    Unavailable { reason: String },
}

impl From<git2::Error> for SourceError {
    fn from(e: git2::Error) -> Self {
        SourceError::Unavailable {
            reason: e.message().to_string(),
        }
    }
}

/// Errors that abort a range walk.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("aggregation cancelled after {processed} commits")]
    Cancelled { processed: usize },
    #[error("aggregation exceeded its {0:?} time limit")]
    TimedOut(std::time::Duration),
    #[error("aggregation task failed: {0}")]
    Task(String),
}

/// A single analyzer failed. Caught by the engine and replaced with that
/// analyzer's empty result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyzerError {
    #[error("analyzer `{analyzer}` failed: {message}")]
    Failed { analyzer: String, message: String },
    #[error("analyzer `{analyzer}` panicked")]
    Panicked { analyzer: String },
}

/// Configuration could not be loaded or is out of bounds.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
