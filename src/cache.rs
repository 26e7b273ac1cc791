// Reference data cache
// Sits between booking sessions and the data store so opening a new booking
// does not refetch cabins, guests and settings every time

use crate::config::CacheConfig;
use crate::reference::{CabinRef, GuestRef, ReferenceDataProvider, ReferenceError, Settings};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Cabins,
    Guests,
    Settings,
}

#[derive(Debug, Default)]
struct CacheStats {
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
    expired_count: AtomicUsize,
    invalidated_count: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub items_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub expired_count: usize,
    pub invalidated_count: usize,
}

#[derive(Debug, Clone)]
enum CachedValue {
    Cabins(Vec<CabinRef>),
    Guests(Vec<GuestRef>),
    Settings(Settings),
}

struct CacheEntry {
    value: CachedValue,
    created_at: Instant,
}

pub struct CachedReferenceData<P> {
    inner: P,
    ttl: Duration,
    entries: DashMap<ReferenceKind, CacheEntry>,
    stats: CacheStats,
}

impl<P: ReferenceDataProvider> CachedReferenceData<P> {
    pub fn new(inner: P, config: &CacheConfig) -> Self {
        Self {
            inner,
            ttl: config.ttl(),
            entries: DashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Drops one kind, or everything when `kind` is `None`. Returns entries removed.
    pub fn invalidate(&self, kind: Option<ReferenceKind>) -> usize {
        let removed = match kind {
            Some(kind) => usize::from(self.entries.remove(&kind).is_some()),
            None => {
                let count = self.entries.len();
                self.entries.clear();
                count
            }
        };
        self.stats
            .invalidated_count
            .fetch_add(removed, Ordering::SeqCst);
        removed
    }

    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            items_count: self.entries.len(),
            hit_count: self.stats.hit_count.load(Ordering::SeqCst),
            miss_count: self.stats.miss_count.load(Ordering::SeqCst),
            expired_count: self.stats.expired_count.load(Ordering::SeqCst),
            invalidated_count: self.stats.invalidated_count.load(Ordering::SeqCst),
        }
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.created_at.elapsed() > self.ttl
    }

    // Only removes the entry if it is still stale, so a concurrent refresh survives
    fn evict_if_expired(&self, kind: ReferenceKind) -> bool {
        self.entries
            .remove_if(&kind, |_, entry| self.is_expired(entry))
            .is_some()
    }

    fn lookup(&self, kind: ReferenceKind) -> Option<CachedValue> {
        let fresh = match self.entries.get(&kind) {
            Some(entry) if !self.is_expired(&entry) => Some(entry.value.clone()),
            Some(_) => None,
            None => {
                self.stats.miss_count.fetch_add(1, Ordering::SeqCst);
                return None;
            }
        };

        match fresh {
            Some(value) => {
                self.stats.hit_count.fetch_add(1, Ordering::SeqCst);
                tracing::trace!(?kind, "reference cache hit");
                Some(value)
            }
            None => {
                // Expired entries count as a miss too
                self.evict_if_expired(kind);
                self.stats.expired_count.fetch_add(1, Ordering::SeqCst);
                self.stats.miss_count.fetch_add(1, Ordering::SeqCst);
                None
            }
        }
    }

    fn store(&self, kind: ReferenceKind, value: CachedValue) {
        tracing::debug!(?kind, "reference cache refreshed");
        self.entries.insert(
            kind,
            CacheEntry {
                value,
                created_at: Instant::now(),
            },
        );
    }
}

#[async_trait]
impl<P: ReferenceDataProvider> ReferenceDataProvider for CachedReferenceData<P> {
    async fn fetch_cabins(&self) -> Result<Vec<CabinRef>, ReferenceError> {
        if let Some(CachedValue::Cabins(cabins)) = self.lookup(ReferenceKind::Cabins) {
            return Ok(cabins);
        }
        let cabins = self.inner.fetch_cabins().await?;
        self.store(ReferenceKind::Cabins, CachedValue::Cabins(cabins.clone()));
        Ok(cabins)
    }

    async fn fetch_guests(&self) -> Result<Vec<GuestRef>, ReferenceError> {
        if let Some(CachedValue::Guests(guests)) = self.lookup(ReferenceKind::Guests) {
            return Ok(guests);
        }
        let guests = self.inner.fetch_guests().await?;
        self.store(ReferenceKind::Guests, CachedValue::Guests(guests.clone()));
        Ok(guests)
    }

    async fn fetch_settings(&self) -> Result<Settings, ReferenceError> {
        if let Some(CachedValue::Settings(settings)) = self.lookup(ReferenceKind::Settings) {
            return Ok(settings);
        }
        let settings = self.inner.fetch_settings().await?;
        self.store(ReferenceKind::Settings, CachedValue::Settings(settings.clone()));
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::fixtures::{cabin, guest, settings};
    use crate::reference::ReferenceSnapshot;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    // Counts how often the underlying store is hit
    #[derive(Default)]
    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ReferenceDataProvider for CountingProvider {
        async fn fetch_cabins(&self) -> Result<Vec<CabinRef>, ReferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ReferenceError::Unavailable("store offline".to_string()));
            }
            Ok(vec![cabin(1, 100, 10)])
        }

        async fn fetch_guests(&self) -> Result<Vec<GuestRef>, ReferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![guest(7, "Jonas Berg")])
        }

        async fn fetch_settings(&self) -> Result<Settings, ReferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(settings())
        }
    }

    fn config(ttl_seconds: u64) -> CacheConfig {
        CacheConfig { ttl_seconds }
    }

    #[tokio::test]
    async fn test_cache_hits_after_first_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = CachedReferenceData::new(
            CountingProvider {
                calls: calls.clone(),
                fail: false,
            },
            &config(60),
        );

        ReferenceSnapshot::capture(&cache).await.unwrap();
        ReferenceSnapshot::capture(&cache).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let stats = cache.stats();
        assert_eq!(stats.items_count, 3);
        assert_eq!(stats.miss_count, 3);
        assert_eq!(stats.hit_count, 3);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = CachedReferenceData::new(
            CountingProvider {
                calls: calls.clone(),
                fail: false,
            },
            &config(0),
        );

        cache.fetch_settings().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.fetch_settings().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().expired_count, 1);
        assert_eq!(cache.stats().hit_count, 0);
    }

    #[test]
    fn test_eviction_spares_refreshed_entry() {
        let mut cache = CachedReferenceData::new(CountingProvider::default(), &config(60));
        cache.ttl = Duration::from_millis(20);

        cache.store(ReferenceKind::Settings, CachedValue::Settings(settings()));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.evict_if_expired(ReferenceKind::Settings));
        assert_eq!(cache.stats().items_count, 0);

        // A refresh lands between the stale read and the eviction
        cache.store(ReferenceKind::Settings, CachedValue::Settings(settings()));
        std::thread::sleep(Duration::from_millis(30));
        let stale = cache.entries.get(&ReferenceKind::Settings).map(|entry| cache.is_expired(&entry));
        assert_eq!(stale, Some(true));
        cache.store(ReferenceKind::Settings, CachedValue::Settings(settings()));
        assert!(!cache.evict_if_expired(ReferenceKind::Settings));
        assert_eq!(cache.stats().items_count, 1);

        assert!(matches!(
            cache.lookup(ReferenceKind::Settings),
            Some(CachedValue::Settings(_))
        ));
        assert_eq!(cache.stats().hit_count, 1);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = CachedReferenceData::new(CountingProvider::default(), &config(60));
        ReferenceSnapshot::capture(&cache).await.unwrap();

        assert_eq!(cache.invalidate(Some(ReferenceKind::Settings)), 1);
        assert_eq!(cache.invalidate(Some(ReferenceKind::Settings)), 0);
        assert_eq!(cache.invalidate(None), 2);

        let stats = cache.stats();
        assert_eq!(stats.items_count, 0);
        assert_eq!(stats.invalidated_count, 3);

        cache.fetch_cabins().await.unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = CachedReferenceData::new(
            CountingProvider {
                calls: Arc::default(),
                fail: true,
            },
            &config(60),
        );

        assert!(cache.fetch_cabins().await.is_err());
        assert!(cache.fetch_cabins().await.is_err());
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().items_count, 0);
    }
}
