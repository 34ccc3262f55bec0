//! # Analytics Engine
//!
//! Fans a [`RangeAggregate`] out to every registered [`Analyzer`] on the
//! blocking pool, merges the results into an [`AnalyticsReport`] and caches
//! the report under the aggregate's [`CacheKey`].
//!
//! A failing or panicking analyzer only costs its own section: it is logged
//! and replaced with that section's empty metrics.

use futures::future::join_all;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::spawn_blocking;

use crate::analysis::cache::{CacheManager, ReportCache};
use crate::analysis::collaboration::{CollaborationAnalyzer, CollaborationMetrics};
use crate::analysis::quality::{QualityAnalyzer, QualityMetrics};
use crate::analysis::risk::{RiskAnalyzer, RiskMetrics};
use crate::analysis::time::{TimeAnalyzer, TimeMetrics};
use crate::config::AnalyticsConfig;
use crate::error::AnalyzerError;
use crate::types::{AnalyticsReport, CacheKey, RangeAggregate};

/// Which report section an analyzer fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyzerKind {
    Time,
    Collaboration,
    Quality,
    Risk,
}

impl AnalyzerKind {
    /// The result used when this section's analyzer fails.
    pub fn empty(self) -> Metrics {
        match self {
            AnalyzerKind::Time => Metrics::Time(TimeMetrics::default()),
            AnalyzerKind::Collaboration => Metrics::Collaboration(CollaborationMetrics::default()),
            AnalyzerKind::Quality => Metrics::Quality(QualityMetrics::default()),
            AnalyzerKind::Risk => Metrics::Risk(RiskMetrics::default()),
        }
    }
}

/// One analyzer's output.
#[derive(Debug, Clone, PartialEq)]
pub enum Metrics {
    Time(TimeMetrics),
    Collaboration(CollaborationMetrics),
    Quality(QualityMetrics),
    Risk(RiskMetrics),
}

impl Metrics {
    pub fn kind(&self) -> AnalyzerKind {
        match self {
            Metrics::Time(_) => AnalyzerKind::Time,
            Metrics::Collaboration(_) => AnalyzerKind::Collaboration,
            Metrics::Quality(_) => AnalyzerKind::Quality,
            Metrics::Risk(_) => AnalyzerKind::Risk,
        }
    }
}

/// A pure computation from an aggregate to one report section.
///
/// Implementations must not do I/O or touch shared mutable state.
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> AnalyzerKind;
    fn analyze(&self, aggregate: &RangeAggregate) -> Result<Metrics, AnalyzerError>;
}

type InFlight = HashMap<CacheKey, Arc<OnceCell<Arc<AnalyticsReport>>>>;

/// One caller's membership in the shared computation for a key.
///
/// Dropping it, on completion or when the caller's future is dropped, removes
/// the key's entry once the report is ready or no other caller is waiting.
struct Flight<'a> {
    in_flight: &'a Mutex<InFlight>,
    key: CacheKey,
    cell: Arc<OnceCell<Arc<AnalyticsReport>>>,
}

impl<'a> Flight<'a> {
    fn join(in_flight: &'a Mutex<InFlight>, key: CacheKey) -> Self {
        let cell = in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone();
        Self { in_flight, key, cell }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = in_flight.get(&self.key) else {
            return;
        };
        if !Arc::ptr_eq(entry, &self.cell) {
            return;
        }
        // The map and this flight are the last holders: nobody else is waiting
        if entry.initialized() || Arc::strong_count(entry) <= 2 {
            in_flight.remove(&self.key);
        }
    }
}

pub struct AnalyticsEngine {
    analyzers: Vec<Arc<dyn Analyzer>>,
    cache: Arc<dyn ReportCache>,
    workers: Arc<Semaphore>,
    in_flight: Mutex<InFlight>,
}

impl AnalyticsEngine {
    /// The four standard analyzers with an LRU cache sized from `config`.
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self::with_cache(config, Arc::new(CacheManager::new(config.cache_max_size)))
    }

    pub fn with_cache(config: &AnalyticsConfig, cache: Arc<dyn ReportCache>) -> Self {
        let analyzers: Vec<Arc<dyn Analyzer>> = vec![
            Arc::new(TimeAnalyzer::from_config(config)),
            Arc::new(CollaborationAnalyzer::from_config(config)),
            Arc::new(QualityAnalyzer::from_config(config)),
            Arc::new(RiskAnalyzer::from_config(config)),
        ];
        Self::with_analyzers(config, analyzers, cache)
    }

    /// A custom analyzer set. Sections without an analyzer stay empty.
    pub fn with_analyzers(
        config: &AnalyticsConfig,
        analyzers: Vec<Arc<dyn Analyzer>>,
        cache: Arc<dyn ReportCache>,
    ) -> Self {
        Self {
            analyzers,
            cache,
            workers: Arc::new(Semaphore::new(config.effective_worker_pool_size())),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<dyn ReportCache> {
        &self.cache
    }

    /// Number of fingerprints with a computation in progress.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Analyze `aggregate`, reusing a cached report when the fingerprint matches.
    ///
    /// Concurrent calls with the same fingerprint share one computation.
    pub async fn analyze(&self, aggregate: Arc<RangeAggregate>) -> Arc<AnalyticsReport> {
        let key = CacheKey::fingerprint(&aggregate);
        if let Some(report) = self.cache.get(&key) {
            debug!("report cache hit for {:?}", key);
            return report;
        }

        let flight = Flight::join(&self.in_flight, key.clone());
        let report = flight
            .cell
            .get_or_init(|| async {
                // Another flight may have finished between the miss and now
                if let Some(report) = self.cache.get(&key) {
                    return report;
                }
                debug!("report cache miss for {:?}", key);
                let report = Arc::new(self.run_analyzers(aggregate.clone()).await);
                self.cache.put(key.clone(), report.clone());
                report
            })
            .await
            .clone();
        report
    }

    /// Run every analyzer without consulting the cache.
    pub async fn run_analyzers(&self, aggregate: Arc<RangeAggregate>) -> AnalyticsReport {
        let started = Instant::now();
        let tasks = self.analyzers.iter().map(|analyzer| {
            let analyzer = Arc::clone(analyzer);
            let aggregate = Arc::clone(&aggregate);
            let workers = Arc::clone(&self.workers);
            async move {
                let name = analyzer.name();
                let kind = analyzer.kind();
                let outcome = match workers.acquire_owned().await {
                    Ok(permit) => spawn_blocking(move || {
                        let _permit = permit;
                        analyzer.analyze(&aggregate)
                    })
                    .await
                    .unwrap_or_else(|e| {
                        if !e.is_panic() {
                            warn!("analyzer {} was cancelled: {}", name, e);
                        }
                        Err(AnalyzerError::Panicked {
                            analyzer: name.to_string(),
                        })
                    }),
                    Err(e) => Err(AnalyzerError::Failed {
                        analyzer: name.to_string(),
                        message: e.to_string(),
                    }),
                };
                match outcome {
                    Ok(metrics) => metrics,
                    Err(e) => {
                        warn!("{}; using empty {:?} metrics", e, kind);
                        kind.empty()
                    }
                }
            }
        });

        let results = join_all(tasks).await;
        debug!(
            "ran {} analyzers in {:.3}s",
            results.len(),
            started.elapsed().as_secs_f64()
        );
        merge(results)
    }
}

/// Place each section into its slot; the first result for a section wins.
fn merge(results: Vec<Metrics>) -> AnalyticsReport {
    let mut time = None;
    let mut collaboration = None;
    let mut quality = None;
    let mut risk = None;

    for metrics in results {
        match metrics {
            Metrics::Time(m) => {
                time.get_or_insert(m);
            }
            Metrics::Collaboration(m) => {
                collaboration.get_or_insert(m);
            }
            Metrics::Quality(m) => {
                quality.get_or_insert(m);
            }
            Metrics::Risk(m) => {
                risk.get_or_insert(m);
            }
        }
    }

    AnalyticsReport {
        time: time.unwrap_or_default(),
        collaboration: collaboration.unwrap_or_default(),
        quality: quality.unwrap_or_default(),
        risk: risk.unwrap_or_default(),
    }
}
