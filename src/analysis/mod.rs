pub mod aggregator;
mod cache;
pub mod collaboration;
pub mod engine;
pub mod git;
pub mod quality;
pub mod risk;
pub mod source;
pub mod time;


pub use aggregator::CommitAggregator;
pub use cache::{CacheManager, NoopCache, ReportCache};
pub use engine::{Analyzer, AnalyzerKind, AnalyticsEngine, Metrics};
pub use git::GitSource;
pub use source::{CommitSource, MemorySource};
