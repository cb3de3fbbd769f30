use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;
use tracing::{debug, info};
use crate::dedup::DedupCache;
use crate::errors::IastError;
use crate::models::{TelemetryEvent, TenantKey};
use super::store::{RequestStore, StoreFactory};

/// Flat lifetime of a tenant's store handle.
pub const MODEL_TTL: Duration = Duration::from_secs(180);

struct ModelHandle {
    store: Arc<dyn RequestStore>,
    created: Instant,
}

/// Lazily opened per-tenant store handles, expiring together with the
/// tenant's dedup partition.
pub struct ModelRegistry {
    factory: Arc<dyn StoreFactory>,
    cache: Arc<DedupCache>,
    handles: DashMap<TenantKey, ModelHandle>,
    ttl: Duration,
}

impl ModelRegistry {
    pub fn new(factory: Arc<dyn StoreFactory>, cache: Arc<DedupCache>) -> Self {
        Self::with_ttl(factory, cache, MODEL_TTL)
    }

    pub fn with_ttl(factory: Arc<dyn StoreFactory>, cache: Arc<DedupCache>, ttl: Duration) -> Self {
        Self {
            factory,
            cache,
            handles: DashMap::new(),
            ttl,
        }
    }

    pub fn handle(&self, tenant: &TenantKey) -> Result<Arc<dyn RequestStore>, IastError> {
        self.handle_at(tenant, Instant::now())
    }

    /// Live handle for `tenant` as of `now`, after sweeping expired ones.
    pub fn handle_at(&self, tenant: &TenantKey, now: Instant) -> Result<Arc<dyn RequestStore>, IastError> {
        self.sweep_at(now);
        let entry = self.handles.entry(tenant.clone()).or_try_insert_with(|| {
            debug!(tenant = %tenant, "Opening request store");
            self.factory.open(tenant).map(|store| ModelHandle { store, created: now })
        })?;
        Ok(entry.store.clone())
    }

    pub async fn put(&self, event: &TelemetryEvent) -> Result<bool, IastError> {
        let tenant = event.tenant()?;
        let store = self.handle(&tenant)?;
        store.put(event).await
    }

    /// Drop the tenant's handle regardless of its age.
    pub fn reset(&self, tenant: &TenantKey) {
        self.handles.remove(tenant);
    }

    pub fn sweep(&self) -> Vec<TenantKey> {
        self.sweep_at(Instant::now())
    }

    /// Destroy handles older than the TTL and clear their dedup partitions.
    pub fn sweep_at(&self, now: Instant) -> Vec<TenantKey> {
        let expired: Vec<TenantKey> = self
            .handles
            .iter()
            .filter(|h| self.is_expired(h.created, now))
            .map(|h| h.key().clone())
            .collect();

        for tenant in &expired {
            if self.handles.remove_if(tenant, |_, h| self.is_expired(h.created, now)).is_some() {
                self.cache.clean(tenant);
            }
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "Expired request store handles");
        }
        expired
    }

    fn is_expired(&self, created: Instant, now: Instant) -> bool {
        now.saturating_duration_since(created) > self.ttl
    }

    pub fn contains(&self, tenant: &TenantKey) -> bool {
        self.handles.contains_key(tenant)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use async_trait::async_trait;

    struct NullStore;

    #[async_trait]
    impl RequestStore for NullStore {
        async fn put(&self, _event: &TelemetryEvent) -> Result<bool, IastError> {
            Ok(true)
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        opened: AtomicUsize,
    }

    impl StoreFactory for CountingFactory {
        fn open(&self, _tenant: &TenantKey) -> Result<Arc<dyn RequestStore>, IastError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullStore))
        }
    }

    struct BrokenFactory;

    impl StoreFactory for BrokenFactory {
        fn open(&self, tenant: &TenantKey) -> Result<Arc<dyn RequestStore>, IastError> {
            Err(IastError::Database(format!("cannot open {}", tenant)))
        }
    }

    fn setup() -> (Arc<CountingFactory>, Arc<DedupCache>, ModelRegistry) {
        let factory = Arc::new(CountingFactory::default());
        let cache = Arc::new(DedupCache::new(8));
        let registry = ModelRegistry::new(factory.clone(), cache.clone());
        (factory, cache, registry)
    }

    #[test]
    fn test_handle_created_once_within_ttl() {
        let (factory, _cache, registry) = setup();
        let t = TenantKey::from("a_1");
        let t0 = Instant::now();
        let first = registry.handle_at(&t, t0).unwrap();
        let second = registry.handle_at(&t, t0 + Duration::from_secs(60)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_reachable_at_ttl_boundary() {
        let (_factory, cache, registry) = setup();
        let t = TenantKey::from("a_1");
        let t0 = Instant::now();
        let first = registry.handle_at(&t, t0).unwrap();
        cache.check(&t, "f");
        let later = registry.handle_at(&t, t0 + MODEL_TTL).unwrap();
        assert!(Arc::ptr_eq(&first, &later));
        assert!(cache.contains(&t, "f"));
    }

    #[test]
    fn test_expiry_cascades_to_cache() {
        let (factory, cache, registry) = setup();
        let t = TenantKey::from("a_1");
        let t0 = Instant::now();
        registry.handle_at(&t, t0).unwrap();
        cache.check(&t, "f");

        let expired = registry.sweep_at(t0 + MODEL_TTL + Duration::from_secs(1));
        assert_eq!(expired, vec![t.clone()]);
        assert!(!registry.contains(&t));
        assert_eq!(cache.len(&t), 0);

        registry.handle_at(&t, t0 + Duration::from_secs(200)).unwrap();
        assert_eq!(factory.opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_lookup_sweeps_other_tenants() {
        let (_factory, cache, registry) = setup();
        let old = TenantKey::from("old_1");
        let new = TenantKey::from("new_1");
        let t0 = Instant::now();
        registry.handle_at(&old, t0).unwrap();
        cache.check(&old, "f");
        registry.handle_at(&new, t0 + Duration::from_secs(181)).unwrap();
        assert!(!registry.contains(&old));
        assert!(!cache.contains(&old, "f"));
        assert!(registry.contains(&new));
    }

    #[test]
    fn test_ttl_not_refreshed_by_access() {
        let (_factory, _cache, registry) = setup();
        let t = TenantKey::from("a_1");
        let t0 = Instant::now();
        registry.handle_at(&t, t0).unwrap();
        registry.handle_at(&t, t0 + Duration::from_secs(170)).unwrap();
        let expired = registry.sweep_at(t0 + Duration::from_secs(181));
        assert_eq!(expired.len(), 1);
    }

    #[test]
    fn test_reset_drops_handle_only() {
        let (factory, cache, registry) = setup();
        let t = TenantKey::from("a_1");
        registry.handle(&t).unwrap();
        cache.check(&t, "f");
        registry.reset(&t);
        assert!(!registry.contains(&t));
        assert!(cache.contains(&t, "f"));
        registry.handle(&t).unwrap();
        assert_eq!(factory.opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_open_failure_surfaces_and_caches_nothing() {
        let cache = Arc::new(DedupCache::new(8));
        let registry = ModelRegistry::new(Arc::new(BrokenFactory), cache);
        let err = registry.handle(&TenantKey::from("a_1")).err().unwrap();
        assert!(matches!(err, IastError::Database(_)));
        assert!(registry.is_empty());
    }
}
