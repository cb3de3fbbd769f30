use std::io::Read;
use std::sync::Arc;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use tracing::{debug, error, info, warn};
use crate::dedup::{Admission, DedupCache, FingerprintStrategy};
use crate::errors::IastError;
use crate::models::{EventKind, TelemetryEvent, TenantKey};
use super::admin::AdminQueue;
use super::channels::{queue_name, ResultChannels};
use super::registry::ModelRegistry;
use super::stats::IngestStats;

/// What happened to one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Forwarded { queue: String },
    NewRequest,
    Duplicate,
    /// The fingerprint strategy refused the event.
    Whitelisted,
}

/// Headers the transport extracted from the inbound request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Envelope<'a> {
    pub content_type: Option<&'a str>,
    pub content_encoding: Option<&'a str>,
}

pub struct IngestionRouter {
    cache: Arc<DedupCache>,
    registry: Arc<ModelRegistry>,
    strategy: Arc<dyn FingerprintStrategy>,
    channels: Arc<ResultChannels>,
    stats: Arc<IngestStats>,
    admin: AdminQueue,
}

impl IngestionRouter {
    pub fn new(
        cache: Arc<DedupCache>,
        registry: Arc<ModelRegistry>,
        strategy: Arc<dyn FingerprintStrategy>,
        channels: Arc<ResultChannels>,
        stats: Arc<IngestStats>,
        admin: AdminQueue,
    ) -> Self {
        Self { cache, registry, strategy, channels, stats, admin }
    }

    pub fn stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }

    pub fn channels(&self) -> &Arc<ResultChannels> {
        &self.channels
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Decode and dispatch one agent report. Rejected input is counted as
    /// `invalid_data` before the error is returned.
    pub async fn handle(&self, body: &[u8], envelope: Envelope<'_>) -> Result<Outcome, IastError> {
        self.update_setting().await;
        let result = match decode(body, envelope) {
            Ok(event) => self.dispatch(event).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            if e.is_expected() {
                self.stats.record_invalid();
                warn!(error = %e, "Invalid data posted, rejected");
            } else {
                error!(error = %e, error_type = e.classify().error_type, "Unexpected error while processing data");
            }
        }
        result
    }

    async fn dispatch(&self, event: TelemetryEvent) -> Result<Outcome, IastError> {
        info!(
            request_id = %event.request_id(),
            path = %event.path(),
            hooks = event.hook_info.len(),
            "Received request data"
        );
        match event.kind() {
            EventKind::ScanResult { queue_id } => self.forward(&queue_id, event),
            EventKind::NewRequestCandidate => self.dedup_and_store(event).await,
        }
    }

    fn forward(&self, queue_id: &str, event: TelemetryEvent) -> Result<Outcome, IastError> {
        let queue = queue_name(queue_id);
        info!(request_id = %event.request_id(), queue = %queue, "Send scan result to queue");
        self.channels.send(queue_id, event)?;
        self.stats.record_result();
        Ok(Outcome::Forwarded { queue })
    }

    async fn dedup_and_store(&self, mut event: TelemetryEvent) -> Result<Outcome, IastError> {
        let Some(fingerprint) = self.strategy.fingerprint(&event)? else {
            debug!(request_id = %event.request_id(), "Drop white list request");
            self.stats.record_duplicate();
            return Ok(Outcome::Whitelisted);
        };
        let tenant = event.tenant()?;

        if self.cache.check(&tenant, &fingerprint) == Admission::Seen {
            info!(request_id = %event.request_id(), tenant = %tenant, "Drop duplicate request (request in lru)");
            self.stats.record_duplicate();
            return Ok(Outcome::Duplicate);
        }

        event.set_fingerprint(fingerprint.clone());
        let guard = CompensationGuard::new(&self.cache, &tenant, &fingerprint);
        let stored = self.registry.put(&event).await?;
        guard.disarm();

        if stored {
            info!(request_id = %event.request_id(), tenant = %tenant, "Get new request");
            self.stats.record_new();
            Ok(Outcome::NewRequest)
        } else {
            info!(request_id = %event.request_id(), tenant = %tenant, "Drop duplicate request (already stored)");
            self.stats.record_duplicate();
            Ok(Outcome::Duplicate)
        }
    }

    /// Apply pending admin actions.
    pub async fn update_setting(&self) {
        for action in self.admin.drain().await {
            for host_port in &action.lru_clean {
                let tenant = TenantKey::from(host_port.as_str());
                self.registry.reset(&tenant);
                self.cache.clean(&tenant);
                info!(tenant = %tenant, "Flushed tenant dedup state");
            }
        }
    }
}

/// Removes a provisional dedup entry unless persistence completed.
/// Runs on error returns and when the request future is dropped.
struct CompensationGuard<'a> {
    cache: &'a DedupCache,
    tenant: &'a TenantKey,
    fingerprint: &'a str,
    armed: bool,
}

impl<'a> CompensationGuard<'a> {
    fn new(cache: &'a DedupCache, tenant: &'a TenantKey, fingerprint: &'a str) -> Self {
        Self { cache, tenant, fingerprint, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CompensationGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(tenant = %self.tenant, "Persistence did not complete, releasing dedup entry");
            self.cache.delete(self.tenant, self.fingerprint);
        }
    }
}

pub fn decode(body: &[u8], envelope: Envelope<'_>) -> Result<TelemetryEvent, IastError> {
    let content_type = envelope.content_type.unwrap_or("None");
    if !content_type.starts_with("application/json") {
        return Err(IastError::ContentTypeInvalid(content_type.to_string()));
    }
    match envelope.content_encoding {
        Some(encoding) if encoding.eq_ignore_ascii_case("deflate") => {
            TelemetryEvent::parse(&inflate(body)?)
        }
        _ => TelemetryEvent::parse(body),
    }
}

/// Accepts zlib-wrapped and raw deflate streams.
fn inflate(data: &[u8]) -> Result<Vec<u8>, IastError> {
    let mut out = Vec::new();
    if ZlibDecoder::new(data).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }
    out.clear();
    DeflateDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| IastError::ContentTypeInvalid(format!("deflate body decode error: {}", e)))?;
    Ok(out)
}
