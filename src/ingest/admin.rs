use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use crate::errors::IastError;

/// Out-of-band instruction applied before the next event is handled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAction {
    /// Tenants (`host_port`) whose store handle and dedup partition are purged.
    #[serde(default)]
    pub lru_clean: Vec<String>,
}

/// Sending side, held by the HTTP layer.
#[derive(Clone)]
pub struct AdminHandle {
    tx: mpsc::UnboundedSender<AdminAction>,
}

impl AdminHandle {
    pub fn submit(&self, action: AdminAction) -> Result<(), IastError> {
        self.tx
            .send(action)
            .map_err(|_| IastError::Internal("admin queue closed".to_string()))
    }
}

/// Receiving side, drained by the router.
pub struct AdminQueue {
    rx: Mutex<mpsc::UnboundedReceiver<AdminAction>>,
}

impl AdminQueue {
    /// Everything queued so far, in submission order.
    pub async fn drain(&self) -> Vec<AdminAction> {
        let mut rx = self.rx.lock().await;
        let mut actions = Vec::new();
        while let Ok(action) = rx.try_recv() {
            actions.push(action);
        }
        actions
    }
}

pub fn admin_channel() -> (AdminHandle, AdminQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AdminHandle { tx }, AdminQueue { rx: Mutex::new(rx) })
}
