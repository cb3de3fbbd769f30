use dashmap::DashMap;
use tokio::sync::mpsc;
use crate::errors::IastError;
use crate::models::TelemetryEvent;

const QUEUE_PREFIX: &str = "rasp_result_queue_";

pub fn queue_name(queue_id: &str) -> String {
    format!("{}{}", QUEUE_PREFIX, queue_id)
}

/// Named channels carrying scan-result telemetry back to scanners.
#[derive(Default)]
pub struct ResultChannels {
    queues: DashMap<String, mpsc::UnboundedSender<TelemetryEvent>>,
}

impl ResultChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the receiver for `queue_id`.
    pub fn subscribe(&self, queue_id: &str) -> mpsc::UnboundedReceiver<TelemetryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.queues.insert(queue_name(queue_id), tx);
        rx
    }

    pub fn unsubscribe(&self, queue_id: &str) {
        self.queues.remove(&queue_name(queue_id));
    }

    pub fn send(&self, queue_id: &str, event: TelemetryEvent) -> Result<(), IastError> {
        let name = queue_name(queue_id);
        let delivered = match self.queues.get(&name) {
            Some(tx) => tx.send(event).is_ok(),
            None => return Err(IastError::QueueNotExist(name)),
        };
        if !delivered {
            self.queues.remove(&name);
            return Err(IastError::QueueNotExist(name));
        }
        Ok(())
    }

    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.iter().map(|q| q.key().clone()).collect();
        names.sort();
        names
    }
}
