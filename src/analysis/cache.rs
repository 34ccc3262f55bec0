use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::{AnalyticsReport, CacheKey};

/// Storage for computed reports, keyed by aggregate fingerprint.
pub trait ReportCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Arc<AnalyticsReport>>;
    fn put(&self, key: CacheKey, report: Arc<AnalyticsReport>);
    fn len(&self) -> usize;
    fn clear(&self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded LRU cache of analysis results
pub struct CacheManager {
    cache: Mutex<LruCache<CacheKey, Arc<AnalyticsReport>>>,
}

impl CacheManager {
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Create a cache holding at most `capacity` reports (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, Arc<AnalyticsReport>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl ReportCache for CacheManager {
    /// Retrieve a result, marking it most recently used
    fn get(&self, key: &CacheKey) -> Option<Arc<AnalyticsReport>> {
        self.lock().get(key).cloned()
    }

    /// Store a result, evicting the least recently used one when full
    fn put(&self, key: CacheKey, report: Arc<AnalyticsReport>) {
        self.lock().put(key, report);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// A cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl ReportCache for NoopCache {
    fn get(&self, _key: &CacheKey) -> Option<Arc<AnalyticsReport>> {
        None
    }

    fn put(&self, _key: CacheKey, _report: Arc<AnalyticsReport>) {}

    fn len(&self) -> usize {
        0
    }

    fn clear(&self) {}
}
