use std::sync::Arc;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::ErrorCode;
use serde::Serialize;
use crate::errors::IastError;
use crate::ingest::store::{RequestStore, StoreFactory};
use crate::models::{TelemetryEvent, TenantKey};
use super::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Unscanned = 0,
    Scanned = 1,
    Scanning = 2,
    Failed = 3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRequest {
    pub id: i64,
    pub data: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanCount {
    pub total: i64,
    pub scanned: i64,
    pub failed: i64,
}

impl Database {
    /// Returns false when the tenant already stores `data_hash`.
    pub fn insert_new_request(&self, tenant: &str, data: &str, data_hash: &str) -> Result<bool, IastError> {
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO new_requests (tenant, data, data_hash, scan_status, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![tenant, data, data_hash, ScanStatus::Unscanned as i64, Utc::now().to_rfc3339()],
        );
        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => Ok(false),
            Err(e) => Err(IastError::Database(format!("Failed to insert new request: {}", e))),
        }
    }

    /// Claim up to `limit` unscanned rows by marking them as scanning.
    pub fn fetch_unscanned(&self, tenant: &str, limit: usize) -> Result<Vec<StoredRequest>, IastError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, data FROM new_requests WHERE tenant = ?1 AND scan_status = ?2 ORDER BY id LIMIT ?3"
        ).map_err(|e| IastError::Database(format!("Query failed: {}", e)))?;

        let rows = stmt.query_map(
            rusqlite::params![tenant, ScanStatus::Unscanned as i64, limit as i64],
            |row: &rusqlite::Row| Ok(StoredRequest { id: row.get(0)?, data: row.get(1)? }),
        ).map_err(|e| IastError::Database(format!("Query error: {}", e)))?;

        let mut claimed = Vec::new();
        for row in rows {
            claimed.push(row.map_err(|e| IastError::Database(format!("Row error: {}", e)))?);
        }

        for item in &claimed {
            conn.execute(
                "UPDATE new_requests SET scan_status = ?1 WHERE id = ?2",
                rusqlite::params![ScanStatus::Scanning as i64, item.id],
            ).map_err(|e| IastError::Database(format!("Failed to claim request: {}", e)))?;
        }
        Ok(claimed)
    }

    /// Mark claimed rows up to `last_id` as scanned, except `failed_ids`.
    pub fn mark_result(&self, tenant: &str, last_id: i64, failed_ids: &[i64]) -> Result<(), IastError> {
        let conn = self.lock()?;
        for id in failed_ids.iter().filter(|id| **id <= last_id) {
            conn.execute(
                "UPDATE new_requests SET scan_status = ?1 WHERE tenant = ?2 AND id = ?3",
                rusqlite::params![ScanStatus::Failed as i64, tenant, id],
            ).map_err(|e| IastError::Database(format!("Failed to mark failure: {}", e)))?;
        }
        conn.execute(
            "UPDATE new_requests SET scan_status = ?1 WHERE tenant = ?2 AND id <= ?3 AND scan_status = ?4",
            rusqlite::params![ScanStatus::Scanned as i64, tenant, last_id, ScanStatus::Scanning as i64],
        ).map_err(|e| IastError::Database(format!("Failed to mark scanned: {}", e)))?;
        Ok(())
    }

    pub fn scan_count(&self, tenant: &str) -> Result<ScanCount, IastError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COUNT(*), \
                    COALESCE(SUM(CASE WHEN scan_status = 1 THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN scan_status = 3 THEN 1 ELSE 0 END), 0) \
             FROM new_requests WHERE tenant = ?1",
            rusqlite::params![tenant],
            |row: &rusqlite::Row| Ok(ScanCount { total: row.get(0)?, scanned: row.get(1)?, failed: row.get(2)? }),
        ).map_err(|e| IastError::Database(format!("Query error: {}", e)))
    }

    /// Return interrupted (scanning or failed) rows to unscanned.
    pub fn reset_scanning(&self, tenant: &str) -> Result<usize, IastError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE new_requests SET scan_status = ?1 WHERE tenant = ?2 AND scan_status > ?3",
            rusqlite::params![ScanStatus::Unscanned as i64, tenant, ScanStatus::Scanned as i64],
        ).map_err(|e| IastError::Database(format!("Failed to reset requests: {}", e)))
    }
}

/// SQLite-backed store handle for one tenant.
pub struct NewRequestModel {
    db: Database,
    tenant: TenantKey,
}

impl NewRequestModel {
    pub fn new(db: Database, tenant: TenantKey) -> Self {
        Self { db, tenant }
    }

    pub fn tenant(&self) -> &TenantKey {
        &self.tenant
    }
}

#[async_trait]
impl RequestStore for NewRequestModel {
    async fn put(&self, event: &TelemetryEvent) -> Result<bool, IastError> {
        let data_hash = event.fingerprint().ok_or_else(|| {
            IastError::Internal(format!("request {} reached storage without a fingerprint", event.request_id()))
        })?;
        let data = event.dump()?;
        self.db.insert_new_request(self.tenant.as_str(), &data, data_hash)
    }
}

impl StoreFactory for Database {
    fn open(&self, tenant: &TenantKey) -> Result<Arc<dyn RequestStore>, IastError> {
        Ok(Arc::new(NewRequestModel::new(self.clone(), tenant.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::telemetry::fixtures::new_request;

    fn fingerprinted(hash: &str) -> TelemetryEvent {
        let mut event = TelemetryEvent::from_value(new_request()).unwrap();
        event.set_fingerprint(hash.to_string());
        event
    }

    #[test]
    fn test_insert_and_duplicate() {
        let db = Database::in_memory().unwrap();
        assert!(db.insert_new_request("h_80", "{}", "abc").unwrap());
        assert!(!db.insert_new_request("h_80", "{}", "abc").unwrap());
        // Same hash under another tenant is distinct
        assert!(db.insert_new_request("h_81", "{}", "abc").unwrap());
    }

    #[test]
    fn test_fetch_unscanned_claims_rows() {
        let db = Database::in_memory().unwrap();
        for hash in ["a", "b", "c"] {
            db.insert_new_request("h_80", "{}", hash).unwrap();
        }
        let first = db.fetch_unscanned("h_80", 2).unwrap();
        assert_eq!(first.len(), 2);
        let second = db.fetch_unscanned("h_80", 2).unwrap();
        assert_eq!(second.len(), 1);
        assert!(db.fetch_unscanned("h_80", 2).unwrap().is_empty());
    }

    #[test]
    fn test_mark_result_and_count() {
        let db = Database::in_memory().unwrap();
        for hash in ["a", "b", "c"] {
            db.insert_new_request("h_80", "{}", hash).unwrap();
        }
        let claimed = db.fetch_unscanned("h_80", 3).unwrap();
        let last_id = claimed.last().unwrap().id;
        db.mark_result("h_80", last_id, &[claimed[1].id]).unwrap();

        let count = db.scan_count("h_80").unwrap();
        assert_eq!(count, ScanCount { total: 3, scanned: 2, failed: 1 });
    }

    #[test]
    fn test_reset_scanning() {
        let db = Database::in_memory().unwrap();
        db.insert_new_request("h_80", "{}", "a").unwrap();
        db.insert_new_request("h_80", "{}", "b").unwrap();
        db.fetch_unscanned("h_80", 2).unwrap();
        assert_eq!(db.reset_scanning("h_80").unwrap(), 2);
        assert_eq!(db.fetch_unscanned("h_80", 5).unwrap().len(), 2);
    }

    #[test]
    fn test_scan_count_empty_tenant() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.scan_count("none_1").unwrap(), ScanCount::default());
    }

    #[tokio::test]
    async fn test_model_put_reports_duplicates() {
        let db = Database::in_memory().unwrap();
        let store = db.open(&TenantKey::from("www.test-host.com_80")).unwrap();
        assert!(store.put(&fingerprinted("f1")).await.unwrap());
        assert!(!store.put(&fingerprinted("f1")).await.unwrap());
        assert!(store.put(&fingerprinted("f2")).await.unwrap());
        assert_eq!(db.scan_count("www.test-host.com_80").unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_model_put_requires_fingerprint() {
        let db = Database::in_memory().unwrap();
        let store = db.open(&TenantKey::from("h_80")).unwrap();
        let event = TelemetryEvent::from_value(new_request()).unwrap();
        let err = store.put(&event).await.unwrap_err();
        assert!(matches!(err, IastError::Internal(_)));
    }
}
