use std::sync::Arc;
use async_trait::async_trait;
use crate::errors::IastError;
use crate::models::{TelemetryEvent, TenantKey};

/// Per-tenant persistence handle for new-request candidates.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// `Ok(true)` when inserted, `Ok(false)` when the fingerprint is already stored.
    async fn put(&self, event: &TelemetryEvent) -> Result<bool, IastError>;
}

/// Materializes a store handle for a tenant.
pub trait StoreFactory: Send + Sync {
    fn open(&self, tenant: &TenantKey) -> Result<Arc<dyn RequestStore>, IastError>;
}
