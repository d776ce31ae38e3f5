//! Entity resolution cache.
//!
//! Maps an entity selector to the id of the first matching Dynatrace entity.
//! Misses load through [`EntitiesApi`]; concurrent misses on one selector
//! share a single lookup. "Not found" and failed lookups are cached as an
//! empty id so a missing entity costs one request per TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dtx_api::EntitiesApi;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// How long a resolved id stays valid.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
struct CachedEntity {
    entity_id: String,
    expires_at: Instant,
}

impl CachedEntity {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Selector to entity id cache with single-flight loading.
pub struct EntityCache {
    api: Arc<dyn EntitiesApi>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedEntity>>,
    in_flight: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl EntityCache {
    /// Creates a cache with the default TTL.
    #[must_use]
    pub fn new(api: Arc<dyn EntitiesApi>) -> Self {
        Self::with_ttl(api, DEFAULT_TTL)
    }

    /// Creates a cache with a custom TTL.
    #[must_use]
    pub fn with_ttl(api: Arc<dyn EntitiesApi>, ttl: Duration) -> Self {
        Self {
            api,
            ttl,
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a selector to an entity id.
    ///
    /// Returns an empty string if no entity matches or the lookup failed.
    pub async fn resolve(&self, selector: &str) -> String {
        let cell = {
            let mut in_flight = self.in_flight.lock();
            // Re-checked under the lock so a load that just finished is seen.
            if let Some(entity_id) = self.cached(selector) {
                return entity_id;
            }
            Arc::clone(in_flight.entry(selector.to_string()).or_default())
        };

        let entity_id = cell.get_or_init(|| self.load(selector)).await.clone();

        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(selector)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            in_flight.remove(selector);
        }

        entity_id
    }

    /// Returns the cached id if present and not expired.
    #[must_use]
    pub fn cached(&self, selector: &str) -> Option<String> {
        let entries = self.entries.read();
        entries
            .get(selector)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.entity_id.clone())
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    async fn load(&self, selector: &str) -> String {
        let entity_id = match self.api.get_entities(selector).await {
            Ok(list) => list
                .entities
                .into_iter()
                .next()
                .map(|entity| entity.entity_id)
                .unwrap_or_default(),
            Err(e) => {
                warn!(selector = %selector, error = %e, "failed to resolve entity");
                String::new()
            }
        };
        debug!(selector = %selector, entity_id = %entity_id, "resolved entity");

        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.retain(|_, entry| !entry.is_expired(now));
        entries.insert(
            selector.to_string(),
            CachedEntity {
                entity_id: entity_id.clone(),
                expires_at: now + self.ttl,
            },
        );

        entity_id
    }
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dtx_api::{ApiError, ApiFuture, EntitiesList, Entity};

    use super::*;

    struct FakeEntities {
        calls: AtomicUsize,
        delay: Duration,
        result: fn(&str) -> Result<Vec<&'static str>, ApiError>,
    }

    impl FakeEntities {
        fn new(result: fn(&str) -> Result<Vec<&'static str>, ApiError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                result,
            })
        }

        fn slow(result: fn(&str) -> Result<Vec<&'static str>, ApiError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay: Duration::from_millis(50),
                result,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl EntitiesApi for FakeEntities {
        fn get_entities<'a>(&'a self, entity_selector: &'a str) -> ApiFuture<'a, EntitiesList> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                let ids = (self.result)(entity_selector)?;
                Ok(EntitiesList {
                    entities: ids
                        .into_iter()
                        .map(|id| Entity {
                            entity_id: id.to_string(),
                            ..Entity::default()
                        })
                        .collect(),
                    ..EntitiesList::default()
                })
            })
        }
    }

    fn found(_: &str) -> Result<Vec<&'static str>, ApiError> {
        Ok(vec!["CLOUD_APPLICATION_INSTANCE-1", "CLOUD_APPLICATION_INSTANCE-2"])
    }

    fn not_found(_: &str) -> Result<Vec<&'static str>, ApiError> {
        Ok(Vec::new())
    }

    fn failing(_: &str) -> Result<Vec<&'static str>, ApiError> {
        Err(ApiError::UnexpectedStatus {
            status: 500,
            body: String::new(),
        })
    }

    // ==================== Resolve Tests ====================

    #[tokio::test]
    async fn test_resolve_takes_first_entity() {
        let api = FakeEntities::new(found);
        let cache = EntityCache::new(api.clone());

        assert_eq!(cache.resolve("sel").await, "CLOUD_APPLICATION_INSTANCE-1");
        assert_eq!(cache.resolve("sel").await, "CLOUD_APPLICATION_INSTANCE-1");
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_cached() {
        let api = FakeEntities::new(not_found);
        let cache = EntityCache::new(api.clone());

        assert_eq!(cache.resolve("sel").await, "");
        assert_eq!(cache.cached("sel").as_deref(), Some(""));
        assert_eq!(cache.resolve("sel").await, "");
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades_to_empty() {
        let api = FakeEntities::new(failing);
        let cache = EntityCache::new(api.clone());

        assert_eq!(cache.resolve("sel").await, "");
        assert_eq!(cache.resolve("sel").await, "");
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let api = FakeEntities::new(found);
        let cache = EntityCache::new(api.clone());

        cache.resolve("a").await;
        cache.resolve("b").await;
        assert_eq!(api.calls(), 2);
        assert_eq!(cache.len(), 2);
    }

    // ==================== Expiry Tests ====================

    #[tokio::test]
    async fn test_expired_entry_reloads() {
        let api = FakeEntities::new(found);
        let cache = EntityCache::with_ttl(api.clone(), Duration::from_millis(10));

        cache.resolve("sel").await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.cached("sel").is_none());
        cache.resolve("sel").await;
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_purged_on_write() {
        let api = FakeEntities::new(found);
        let cache = EntityCache::with_ttl(api, Duration::from_millis(10));

        cache.resolve("old").await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.resolve("new").await;

        assert_eq!(cache.len(), 1);
    }

    // ==================== Single-Flight Tests ====================

    #[tokio::test]
    async fn test_concurrent_misses_share_one_lookup() {
        let api = FakeEntities::slow(found);
        let cache = EntityCache::new(api.clone());

        let (a, b, c) = tokio::join!(
            cache.resolve("sel"),
            cache.resolve("sel"),
            cache.resolve("sel")
        );

        assert_eq!(a, "CLOUD_APPLICATION_INSTANCE-1");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_across_tasks() {
        let api = FakeEntities::slow(found);
        let cache = Arc::new(EntityCache::new(api.clone()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.resolve("sel").await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), "CLOUD_APPLICATION_INSTANCE-1");
        }
        assert_eq!(api.calls(), 1);
    }
}
