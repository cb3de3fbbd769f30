/// scan_status: 0 unscanned, 1 scanned, 2 scanning, 3 failed.
pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS new_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant TEXT NOT NULL,
    data TEXT NOT NULL,
    data_hash TEXT NOT NULL,
    scan_status INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE(tenant, data_hash)
);

CREATE INDEX IF NOT EXISTS idx_new_requests_status ON new_requests(tenant, scan_status);
";
