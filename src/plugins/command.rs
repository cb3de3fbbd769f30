use crate::models::{TelemetryEvent, TestVector};
use super::mutant::{HookTarget, MutationPlan, Payload, PayloadTable};
use super::taint::is_param_concat_in_hook;
use super::{verify_batch, PluginInfo, ScanPlugin};

static INFO: PluginInfo = PluginInfo {
    name: "command_basic",
    show_name: "Command injection detection",
    description: "Detects shell commands whose structure is altered by request input",
};

const TARGET: HookTarget = HookTarget { hook_type: "command", filter_type: "command", filter_key: "cmd" };

const PAYLOADS: PayloadTable = PayloadTable::uniform(&[
    Payload { attack: "'\"openrasp' cmd", expected: "'\"openrasp' cmd" },
    Payload { attack: "a$(openrasp `cmd`)b", expected: "a$(openrasp `cmd`)b" },
    Payload { attack: "openrasp=openxrasp", expected: "openrasp=openxrasp" },
]);

const FINDING: &str = "Executed command logic can be altered by user input";

pub struct CommandPlugin;

impl ScanPlugin for CommandPlugin {
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

    fn command_event() -> TelemetryEvent {
        let mut value = with_hooks(
            new_request(),
            json!([{
                "hook_type": "command",
                "command": "ping -c 1 example.org",
                "tokens": [
                    { "text": "ping", "start": 0, "stop": 4 },
                    { "text": "-c", "start": 5, "stop": 7 },
                    { "text": "1", "start": 8, "stop": 9 },
                    { "text": "example.org", "start": 10, "stop": 21 }
                ]
            }]),
        );
        value["context"]["querystring"] = json!("host=example.org");
        value["context"]["parameter"] = json!({ "host": ["example.org"] });
        TelemetryEvent::from_value(value).unwrap()
    }

    #[test]
    fn test_same_payloads_on_every_os() {
        assert_eq!(PAYLOADS.linux, PAYLOADS.windows);
        assert_eq!(PAYLOADS.linux, PAYLOADS.mac);
        let plan = CommandPlugin.mutant(&command_event());
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn test_check_token_injection() {
        let plan = CommandPlugin.mutant(&command_event());
        let mut batch = plan.batches().next().unwrap();
        assert_eq!(batch[0].template.params["host"], "'\"openrasp' cmd");

        let injected = TelemetryEvent::from_value(with_hooks(
            new_request(),
            json!([{
                "hook_type": "command",
                "command": "ping -c 1 '\"openrasp' cmd",
                "tokens": [
                    { "text": "ping", "start": 0, "stop": 4 },
                    { "text": "-c", "start": 5, "stop": 7 },
                    { "text": "1", "start": 8, "stop": 9 },
                    { "text": "'\"openrasp'", "start": 10, "stop": 21 },
                    { "text": "cmd", "start": 22, "stop": 25 }
                ]
            }]),
        ))
        .unwrap();
        batch[0].attach_result(injected);
        assert_eq!(CommandPlugin.check(&batch).as_deref(), Some(FINDING));
    }

    #[test]
    fn test_check_quoted_payload_is_not_injection() {
        let plan = CommandPlugin.mutant(&command_event());
        let mut batch = plan.batches().nth(1).unwrap();
        let escaped = TelemetryEvent::from_value(with_hooks(
            new_request(),
            json!([{
                "hook_type": "command",
                "command": "ping 'a$(openrasp `cmd`)b'",
                "tokens": [
                    { "text": "ping", "start": 0, "stop": 4 },
                    { "text": "'a$(openrasp `cmd`)b'", "start": 5, "stop": 26 }
                ]
            }]),
        ))
        .unwrap();
        batch[0].attach_result(escaped);
        assert_eq!(CommandPlugin.check(&batch), None);
    }
}
