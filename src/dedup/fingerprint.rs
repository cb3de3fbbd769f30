use sha2::{Digest, Sha256};
use crate::errors::IastError;
use crate::models::TelemetryEvent;

/// Content hash used for dedup. `Ok(None)` means the event must never be persisted.
pub trait FingerprintStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn fingerprint(&self, event: &TelemetryEvent) -> Result<Option<String>, IastError>;
}

/// Hash over the request shape: tenant, path, call stacks and parameter names.
#[derive(Debug, Clone, Default)]
pub struct DefaultFingerprint {
    drop_paths: Vec<String>,
}

impl DefaultFingerprint {
    pub fn new(drop_paths: Vec<String>) -> Self {
        Self { drop_paths }
    }

    fn is_dropped(&self, path: &str) -> bool {
        self.drop_paths.iter().any(|p| !p.is_empty() && path.contains(p.as_str()))
    }
}

fn sorted_join<I: IntoIterator<Item = String>>(items: I) -> String {
    let mut items: Vec<String> = items.into_iter().collect();
    items.sort();
    items.concat()
}

impl FingerprintStrategy for DefaultFingerprint {
    fn name(&self) -> &'static str {
        "default"
    }

    fn fingerprint(&self, event: &TelemetryEvent) -> Result<Option<String>, IastError> {
        if self.is_dropped(event.path()) {
            return Ok(None);
        }
        let tenant = event.tenant()?;
        let param_keys = sorted_join(event.parameters().keys().cloned());
        let query_keys = sorted_join(event.query_param_dict().into_keys());
        let file_keys = sorted_join(event.upload_files().into_iter().map(|f| f.name));

        let mut hasher = Sha256::new();
        hasher.update(tenant.as_str().as_bytes());
        hasher.update(event.path().as_bytes());
        hasher.update(event.all_stack_hash().as_bytes());
        hasher.update(param_keys.as_bytes());
        hasher.update(event.json_struct().as_bytes());
        hasher.update(query_keys.as_bytes());
        hasher.update(file_keys.as_bytes());
        Ok(Some(hex::encode(hasher.finalize())))
    }
}
