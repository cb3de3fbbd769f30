use std::sync::atomic::{AtomicU64, Ordering};
use serde::Serialize;

#[derive(Debug, Default)]
pub struct IngestStats {
    invalid_data: AtomicU64,
    duplicate_request: AtomicU64,
    new_request: AtomicU64,
    rasp_result_request: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub invalid_data: u64,
    pub duplicate_request: u64,
    pub new_request: u64,
    pub rasp_result_request: u64,
}

impl IngestStats {
    pub fn record_invalid(&self) {
        self.invalid_data.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicate_request.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_new(&self) {
        self.new_request.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_result(&self) {
        self.rasp_result_request.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            invalid_data: self.invalid_data.load(Ordering::Relaxed),
            duplicate_request: self.duplicate_request.load(Ordering::Relaxed),
            new_request: self.new_request.load(Ordering::Relaxed),
            rasp_result_request: self.rasp_result_request.load(Ordering::Relaxed),
        }
    }
}
