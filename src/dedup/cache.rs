use std::num::NonZeroUsize;
use dashmap::DashMap;
use lru::LruCache;
use crate::models::TenantKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First sighting; the fingerprint has been recorded.
    NotSeen,
    Seen,
}

/// Per-tenant bounded recency sets of request fingerprints.
pub struct DedupCache {
    partitions: DashMap<TenantKey, LruCache<String, ()>>,
    capacity: NonZeroUsize,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            partitions: DashMap::new(),
            capacity: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Insert-if-absent, atomic under the partition's shard lock.
    pub fn check(&self, tenant: &TenantKey, fingerprint: &str) -> Admission {
        let mut partition = self
            .partitions
            .entry(tenant.clone())
            .or_insert_with(|| LruCache::new(self.capacity));
        if partition.get(fingerprint).is_some() {
            Admission::Seen
        } else {
            partition.put(fingerprint.to_string(), ());
            Admission::NotSeen
        }
    }

    /// Undo a provisional insert. Missing entries are ignored.
    pub fn delete(&self, tenant: &TenantKey, fingerprint: &str) {
        if let Some(mut partition) = self.partitions.get_mut(tenant) {
            partition.pop(fingerprint);
        }
    }

    pub fn clean(&self, tenant: &TenantKey) {
        self.partitions.remove(tenant);
    }

    pub fn contains(&self, tenant: &TenantKey, fingerprint: &str) -> bool {
        self.partitions
            .get(tenant)
            .map(|p| p.contains(fingerprint))
            .unwrap_or(false)
    }

    pub fn len(&self, tenant: &TenantKey) -> usize {
        self.partitions.get(tenant).map(|p| p.len()).unwrap_or(0)
    }

    pub fn tenant_count(&self) -> usize {
        self.partitions.len()
    }
}
