use crate::models::{TelemetryEvent, TestVector};
use super::mutant::{HookTarget, MutationPlan, Payload, PayloadTable};
use super::taint::is_param_concat_in_hook;
use super::{verify_batch, PluginInfo, ScanPlugin};

static INFO: PluginInfo = PluginInfo {
    name: "writefile_basic",
    show_name: "File write detection",
    description: "Detects file writes whose path is controlled by request input",
};

const TARGET: HookTarget = HookTarget { hook_type: "writeFile", filter_type: "writeFile", filter_key: "realpath" };

const UNIX: &[Payload] = &[
    Payload { attack: "../../../../../../../../../../../../../../../../../tmp/openrasp.test", expected: "/tmp/openrasp.test" },
    Payload { attack: "../../../tmp/rasp", expected: "/tmp/rasp" },
    Payload { attack: "../../../../../../tmp/openrasp.test", expected: "/tmp/openrasp.test" },
];

const PAYLOADS: PayloadTable = PayloadTable {
    linux: UNIX,
    windows: &[
        Payload { attack: "..\\..\\..\\..\\..\\..\\..\\..\\..\\openrasp.test", expected: ":\\openrasp.test" },
        Payload { attack: "..\\..\\..\\openrasp.test", expected: ":\\openrasp.test" },
        Payload { attack: "file://c:\\openrasp.test", expected: "c:\\openrasp.test" },
    ],
    mac: UNIX,
};

const FINDING: &str = "Written file path can be controlled by user input";

pub struct WriteFilePlugin;

impl ScanPlugin for WriteFilePlugin {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::telemetry::fixtures::{new_request, with_hooks};
    use serde_json::json;

    fn write_event(os: &str) -> TelemetryEvent {
        let mut value = with_hooks(
            new_request(),
            json!([{ "hook_type": "writeFile", "path": "/var/www/cache/report.txt", "realpath": "/var/www/cache/report.txt" }]),
        );
        value["context"]["server"]["os"] = json!(os);
        TelemetryEvent::from_value(value).unwrap()
    }

    fn result_with_realpath(realpath: &str) -> TelemetryEvent {
        TelemetryEvent::from_value(with_hooks(
            new_request(),
            json!([{ "hook_type": "writeFile", "path": "x", "realpath": realpath }]),
        ))
        .unwrap()
    }

    #[test]
    fn test_linux_vectors() {
        let vectors: Vec<TestVector> = WriteFilePlugin.mutant(&write_event("Linux")).batches().flatten().collect();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[1].template.params["file"], "../../../tmp/rasp");
        assert_eq!(vectors[1].filters[0].hook_type, "writeFile");
        assert_eq!(vectors[1].filters[0].filter["realpath"], "/tmp/rasp");
    }

    #[test]
    fn test_mac_uses_unix_table() {
        let features: Vec<String> = WriteFilePlugin
            .mutant(&write_event("Mac"))
            .batches()
            .flatten()
            .map(|v| v.payload.feature)
            .collect();
        assert_eq!(features, vec!["/tmp/openrasp.test", "/tmp/rasp", "/tmp/openrasp.test"]);
    }

    #[test]
    fn test_no_write_file_hook() {
        let event = TelemetryEvent::from_value(with_hooks(
            new_request(),
            json!([{ "hook_type": "readFile", "path": "report.txt", "realpath": "/srv/report.txt" }]),
        ))
        .unwrap();
        assert!(WriteFilePlugin.mutant(&event).is_empty());
    }

    #[test]
    fn test_check_windows() {
        let plan = WriteFilePlugin.mutant(&write_event("Windows"));
        let mut batch = plan.batches().next().unwrap();
        batch[0].attach_result(result_with_realpath("D:\\openrasp.test"));
        assert_eq!(WriteFilePlugin.check(&batch).as_deref(), Some(FINDING));

        batch[0].attach_result(result_with_realpath("D:\\inetpub\\openrasp.test"));
        assert_eq!(WriteFilePlugin.check(&batch), None);
    }

    #[test]
    fn test_check_without_result() {
        let plan = WriteFilePlugin.mutant(&write_event("Linux"));
        let batch = plan.batches().next().unwrap();
        assert_eq!(WriteFilePlugin.check(&batch), None);
    }
}
