use crate::models::{TelemetryEvent, TestVector};
use super::mutant::{injection_candidates_with_body, HookTarget, MutationPlan, Payload, PayloadTable};
use super::{verify_batch, PluginInfo, ScanPlugin};

static INFO: PluginInfo = PluginInfo {
    name: "xxe_basic",
    show_name: "XXE detection",
    description: "Detects XML parsers that resolve external entities from request input",
};

const TARGET: HookTarget = HookTarget { hook_type: "xxe", filter_type: "xxe", filter_key: "entity" };

const PAYLOADS: PayloadTable = PayloadTable::uniform(&[Payload {
    attack: "<?xml version=\"1.0\" encoding=\"utf-8\"?><!DOCTYPE root [<!ENTITY  file SYSTEM \"file:///etc/passwd\">]><root>&file;</root>",
    expected: "file:///etc/passwd",
}]);

/// The XML declaration must sit this close to the start of the value.
const XML_PREFIX_WINDOW: usize = 20;

const FINDING: &str = "External entities in user-supplied XML are resolved";

pub struct XxePlugin;

/// The value looks like an XML document.
fn is_xml(value: &str) -> bool {
    let head: String = value.chars().take(XML_PREFIX_WINDOW).collect();
    head.contains("<?xml")
}

impl ScanPlugin for XxePlugin {
    fn info(&self) -> &'static PluginInfo {
        &INFO
    }

    // The entity hook only fires once a document declares one, so the
    // original request need not have reached it.
    fn mutant(&self, event: &TelemetryEvent) -> MutationPlan {
        MutationPlan::build_over(event, TARGET, &PAYLOADS, injection_candidates_with_body, is_xml)
    }

    fn check(&self, batch: &[TestVector]) -> Option<String> {
        verify_batch(batch, TARGET.hook_type, FINDING)
    }
}
