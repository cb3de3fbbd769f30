use crate::models::{TelemetryEvent, TestVector};
use super::mutant::{HookTarget, MutationPlan, Payload, PayloadTable};
use super::taint::is_param_concat_in_hook;
use super::{verify_batch, PluginInfo, ScanPlugin};

static INFO: PluginInfo = PluginInfo {
    name: "ssrf_basic",
    show_name: "SSRF detection",
    description: "Detects outbound requests whose host is controlled by request input",
};

const TARGET: HookTarget = HookTarget { hook_type: "ssrf", filter_type: "ssrf", filter_key: "hostname" };

const PAYLOADS: PayloadTable = PayloadTable::uniform(&[
    Payload { attack: "http://127.1.2.3/", expected: "127.1.2.3" },
]);

const FINDING: &str = "Host of the requested URL can be controlled by user input";

pub struct SsrfPlugin;

impl ScanPlugin for SsrfPlugin {
    fn info(&self) -> &'static PluginInfo {
        &INFO
    }

    fn mutant(&self, event: &TelemetryEvent) -> MutationPlan {
        MutationPlan::build(event, TARGET, &PAYLOADS, |value| {
            is_param_concat_in_hook(event, TARGET.hook_type, value)
        })
    }

    fn check(&self, batch: &[TestVector]) -> Option<String> {
        verify_batch(batch, TARGET.hook_type, FINDING)
    }
}
