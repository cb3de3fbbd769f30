use crate::models::{TelemetryEvent, TestVector};
use super::mutant::{HookTarget, MutationPlan, Payload, PayloadTable};
use super::taint::is_param_concat_in_hook;
use super::{verify_batch, PluginInfo, ScanPlugin};

static INFO: PluginInfo = PluginInfo {
    name: "directory_basic",
    show_name: "Directory listing detection",
    description: "Detects directory listings whose path is controlled by request input",
};

const TARGET: HookTarget = HookTarget { hook_type: "directory", filter_type: "dir", filter_key: "code" };

const PAYLOADS: PayloadTable = PayloadTable {
    linux: &[
        Payload { attack: "../../../../../../../../../../../../../../../../../../../../etc", expected: "/etc" },
        Payload { attack: "../../../../etc", expected: "/etc" },
        Payload { attack: "/etc", expected: "/etc" },
    ],
    windows: &[
        Payload { attack: "..\\..\\..\\..\\..\\..\\..\\..\\..\\windows", expected: ":\\windows" },
        Payload { attack: "c:\\windows", expected: "c:\\windows" },
    ],
    mac: &[
        Payload { attack: "../../../../../../../../../../../../../../../../../../../../private/etc", expected: "/private/etc" },
        Payload { attack: "../../../private/etc", expected: "/private/etc" },
        Payload { attack: "/private/etc", expected: "/private/etc" },
    ],
};

const FINDING: &str = "Listed directory can be controlled by user input";

pub struct DirectoryPlugin;

impl ScanPlugin for DirectoryPlugin {
    fn info(&self) -> &'static PluginInfo {
        &INFO
    }

    fn mutant(&self, event: &TelemetryEvent) -> MutationPlan {
        MutationPlan::build(event, TARGET, &PAYLOADS, |value| {
            let trimmed = value.trim_end_matches(['/', '\\']);
            is_param_concat_in_hook(event, TARGET.hook_type, trimmed)
        })
    }

    fn check(&self, batch: &[TestVector]) -> Option<String> {
        verify_batch(batch, TARGET.hook_type, FINDING)
    }
}
