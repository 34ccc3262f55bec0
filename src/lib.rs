//! # Delivery Analytics for Git Histories
//!
//! `gitpulse` turns the commits of a date range into delivery metrics:
//! velocity, collaboration health, commit quality, risk and release readiness.
//! Everything is derived on demand from the commit log.
//!
//! ## Pipeline
//!
//! - [`DateParser`] resolves expressions such as `"2w"`, `"2025-01-15"` or
//!   `"now"` into a normalized UTC [`DateRange`]
//! - a [`CommitSource`](analysis::CommitSource) lists and materializes commits
//!   ([`GitSource`](analysis::GitSource) for local repositories)
//! - [`CommitAggregator`](analysis::CommitAggregator) folds them into a
//!   [`RangeAggregate`]
//! - [`AnalyticsEngine`](analysis::AnalyticsEngine) runs the analyzers
//!   concurrently and caches the merged [`AnalyticsReport`]
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gitpulse::analysis::{AnalyticsEngine, CommitAggregator, GitSource};
//! use gitpulse::{AnalyticsConfig, DateParser};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let range = DateParser::new().validate_date_range(Some("4w".into()), None)?;
//! let source = GitSource::open(".")?;
//! let aggregate = CommitAggregator::new().aggregate(&range, &source)?;
//!
//! let engine = AnalyticsEngine::new(&AnalyticsConfig::default());
//! let report = engine.analyze(Arc::new(aggregate)).await;
//! println!("bus factor: {}", report.time.bus_factor.factor);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod dates;
pub mod error;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use config::AnalyticsConfig;
pub use dates::{DateInput, DateParser};
pub use error::{AggregateError, CommitError, ConfigError, DateError, SourceError};
pub use types::{AnalyticsReport, CacheKey, CommitRecord, DateRange, FileChange, RangeAggregate, RiskLevel};
