pub mod checker;
pub mod command;
pub mod directory;
pub mod mutant;
pub mod readfile;
pub mod ssrf;
pub mod taint;
pub mod writefile;
pub mod xxe;

use std::collections::BTreeMap;
use std::sync::LazyLock;
use serde::Serialize;
use crate::models::{TelemetryEvent, TestVector};

pub use mutant::{Batches, HookTarget, MutationPlan, Payload, PayloadTable};

#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub name: &'static str,
    pub show_name: &'static str,
    pub description: &'static str,
}

/// Contract between a scan plugin and the scheduler driving it.
pub trait ScanPlugin: Send + Sync {
    fn info(&self) -> &'static PluginInfo;

    /// Test vectors for `event`. Empty when the event never reached the
    /// plugin's hook or no parameter feeds it.
    fn mutant(&self, event: &TelemetryEvent) -> MutationPlan;

    /// Finding text when the batch's returned telemetry confirms the issue.
    fn check(&self, batch: &[TestVector]) -> Option<String>;
}

/// Shared verification step: compare the first vector's returned telemetry
/// against its expected feature.
pub(crate) fn verify_batch(batch: &[TestVector], hook_type: &str, finding: &str) -> Option<String> {
    let vector = batch.first()?;
    let result = vector.result()?;
    checker::check_concat_in_hook(result, hook_type, vector.feature()).then(|| finding.to_string())
}

pub struct PluginRegistry {
    plugins: BTreeMap<&'static str, Box<dyn ScanPlugin>>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<Box<dyn ScanPlugin>>) -> Self {
        Self {
            plugins: plugins.into_iter().map(|p| (p.info().name, p)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn ScanPlugin> {
        self.plugins.get(name).map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.keys().copied().collect()
    }

    pub fn infos(&self) -> Vec<&'static PluginInfo> {
        self.plugins.values().map(|p| p.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

pub static SCAN_PLUGINS: LazyLock<PluginRegistry> = LazyLock::new(|| {
    PluginRegistry::new(vec![
        Box::new(readfile::ReadFilePlugin),
        Box::new(ssrf::SsrfPlugin),
        Box::new(directory::DirectoryPlugin),
        Box::new(command::CommandPlugin),
        Box::new(writefile::WriteFilePlugin),
        Box::new(xxe::XxePlugin),
    ])
});
