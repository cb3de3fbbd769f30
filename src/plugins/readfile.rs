use crate::models::{TelemetryEvent, TestVector};
use super::mutant::{HookTarget, MutationPlan, Payload, PayloadTable};
use super::taint::is_param_concat_in_hook;
use super::{verify_batch, PluginInfo, ScanPlugin};

static INFO: PluginInfo = PluginInfo {
    name: "readfile_basic",
    show_name: "File read detection",
    description: "Detects file reads whose path is controlled by request input",
};

const TARGET: HookTarget = HookTarget { hook_type: "readFile", filter_type: "readFile", filter_key: "realpath" };

const PAYLOADS: PayloadTable = PayloadTable {
    linux: &[
        Payload { attack: "../../../../../../../../../../../../../../../../../../../../etc/passwd", expected: "/etc/passwd" },
        Payload { attack: "../../../etc/passwd", expected: "/etc/passwd" },
        Payload { attack: "/etc/passwd", expected: "/etc/passwd" },
    ],
    windows: &[
        Payload { attack: "..\\..\\..\\..\\..\\..\\..\\..\\..\\Windows\\system.ini", expected: ":\\Windows\\system.ini" },
        Payload { attack: "..\\..\\..\\Windows\\system.ini", expected: ":\\Windows\\system.ini" },
        Payload { attack: "file:///c:\\Windows\\system.ini", expected: "c:\\Windows\\system.ini" },
    ],
    mac: &[
        Payload { attack: "../../../../../../../../../../../../../../../../../../../../private/etc/passwd", expected: "/private/etc/passwd" },
        Payload { attack: "../../../private/etc/passwd", expected: "/private/etc/passwd" },
        Payload { attack: "/private/etc/passwd", expected: "/private/etc/passwd" },
    ],
};

const FINDING: &str = "File read path can be controlled by user input";

pub struct ReadFilePlugin;

impl ScanPlugin for ReadFilePlugin {
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
