use rand::Rng;
use serde_json::Value;
use crate::models::{
    HookFilter, InjectionPoint, JsonKey, PayloadInfo, RequestTemplate, ServerOs, TelemetryEvent,
    TestVector,
};

const SEQ_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SEQ_LEN: usize = 32;

/// Headers that never reach application logic worth probing.
const SKIPPED_HEADERS: &[&str] = &[
    "accept", "accept-charset", "accept-encoding", "accept-language", "accept-datetime",
    "cache-control", "connection", "date", "dnt", "content-type", "upgrade-insecure-requests",
    "expect", "if-match", "if-modified-since", "if-none-match", "if-range", "if-unmodified-since",
    "host", "max-forwards", "origin", "pragma", "range", "sec-fetch-site", "sec-fetch-mode",
    "sec-fetch-user", "te", "trailer", "transfer-encoding", "upgrade", "via", "x-requested-with",
];

/// An attack string and the value the hook resolves it to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    pub attack: &'static str,
    pub expected: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct PayloadTable {
    pub linux: &'static [Payload],
    pub windows: &'static [Payload],
    pub mac: &'static [Payload],
}

impl PayloadTable {
    pub const fn uniform(payloads: &'static [Payload]) -> Self {
        Self { linux: payloads, windows: payloads, mac: payloads }
    }

    pub fn select(&self, os: ServerOs) -> &'static [Payload] {
        match os {
            ServerOs::Linux => self.linux,
            ServerOs::Windows => self.windows,
            ServerOs::Mac => self.mac,
        }
    }
}

/// Which hook a plugin targets and how the agent filters its reports.
#[derive(Debug, Clone, Copy)]
pub struct HookTarget {
    pub hook_type: &'static str,
    pub filter_type: &'static str,
    pub filter_key: &'static str,
}

/// A parameter location and its current literal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub point: InjectionPoint,
    pub value: String,
}

/// Every injectable parameter of the template, across all channels.
pub fn injection_candidates(template: &RequestTemplate) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let named = |map: &std::collections::BTreeMap<String, String>, make: fn(String) -> InjectionPoint| {
        map.iter()
            .map(|(k, v)| Candidate { point: make(k.clone()), value: v.clone() })
            .collect::<Vec<_>>()
    };

    candidates.extend(named(&template.params, |name| InjectionPoint::Query { name }));
    candidates.extend(named(&template.data, |name| InjectionPoint::Body { name }));
    if let Some(json) = &template.json {
        candidates.extend(json_leaves(json).into_iter().map(|(path, value)| Candidate {
            point: InjectionPoint::Json { path },
            value,
        }));
    }
    candidates.extend(
        template
            .headers
            .iter()
            .filter(|(k, _)| !SKIPPED_HEADERS.contains(&k.to_lowercase().as_str()))
            .map(|(k, v)| Candidate { point: InjectionPoint::Header { name: k.clone() }, value: v.clone() }),
    );
    if let Some(cookies) = &template.cookies {
        candidates.extend(named(cookies, |name| InjectionPoint::Cookie { name }));
    }
    candidates
}

/// The parameter channels plus the raw body, when the request carries one.
pub fn injection_candidates_with_body(template: &RequestTemplate) -> Vec<Candidate> {
    let mut candidates = injection_candidates(template);
    if let Some(body) = &template.body {
        candidates.push(Candidate {
            point: InjectionPoint::RawBody,
            value: String::from_utf8_lossy(body).into_owned(),
        });
    }
    candidates
}

/// String and integer leaves with their paths. A scalar root has the empty path.
pub fn json_leaves(root: &Value) -> Vec<(Vec<JsonKey>, String)> {
    let mut leaves = Vec::new();
    let mut stack: Vec<(Vec<JsonKey>, &Value)> = vec![(Vec::new(), root)];
    while let Some((path, value)) = stack.pop() {
        match value {
            Value::String(s) => leaves.push((path, s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => leaves.push((path, n.to_string())),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate().rev() {
                    let mut child = path.clone();
                    child.push(JsonKey::Index(i));
                    stack.push((child, item));
                }
            }
            Value::Object(map) => {
                for (k, item) in map.iter().rev() {
                    let mut child = path.clone();
                    child.push(JsonKey::Key(k.clone()));
                    stack.push((child, item));
                }
            }
            _ => {}
        }
    }
    leaves
}

pub fn payload_seq() -> String {
    let mut rng = rand::thread_rng();
    (0..SEQ_LEN)
        .map(|_| SEQ_CHARSET[rng.gen_range(0..SEQ_CHARSET.len())] as char)
        .collect()
}

/// Vectors a plugin will test for one event. Sequence ids are fixed when the
/// plan is built, so iterating it again yields the same correlation keys.
#[derive(Debug, Clone)]
pub struct MutationPlan {
    template: Option<RequestTemplate>,
    points: Vec<(InjectionPoint, String)>,
    payloads: &'static [Payload],
    target: Option<HookTarget>,
}

impl MutationPlan {
    pub fn empty() -> Self {
        Self { template: None, points: Vec::new(), payloads: &[], target: None }
    }

    /// Plan one batch per (qualifying injection point, payload) pair, for
    /// events that reached the target hook.
    pub fn build<F>(event: &TelemetryEvent, target: HookTarget, table: &PayloadTable, qualifies: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        if !event.has_hook_type(target.hook_type) {
            return Self::empty();
        }
        Self::build_over(event, target, table, injection_candidates, qualifies)
    }

    /// Like [`MutationPlan::build`] without the hook gate, drawing injection
    /// points from `candidates`.
    pub fn build_over<C, F>(
        event: &TelemetryEvent,
        target: HookTarget,
        table: &PayloadTable,
        candidates: C,
        qualifies: F,
    ) -> Self
    where
        C: Fn(&RequestTemplate) -> Vec<Candidate>,
        F: Fn(&str) -> bool,
    {
        let template = RequestTemplate::from_event(event);
        let points: Vec<(InjectionPoint, String)> = candidates(&template)
            .into_iter()
            .filter(|c| qualifies(&c.value))
            .map(|c| (c.point, payload_seq()))
            .collect();
        if points.is_empty() {
            return Self::empty();
        }
        Self {
            template: Some(template),
            points,
            payloads: table.select(event.server_os()),
            target: Some(target),
        }
    }

    pub fn points(&self) -> impl Iterator<Item = (&InjectionPoint, &str)> {
        self.points.iter().map(|(p, s)| (p, s.as_str()))
    }

    pub fn len(&self) -> usize {
        self.points.len() * self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batches(&self) -> Batches<'_> {
        Batches { plan: self, point: 0, payload: 0 }
    }
}

/// Lazily materialized vector batches of a [`MutationPlan`].
pub struct Batches<'a> {
    plan: &'a MutationPlan,
    point: usize,
    payload: usize,
}

impl Iterator for Batches<'_> {
    type Item = Vec<TestVector>;

    fn next(&mut self) -> Option<Self::Item> {
        let template = self.plan.template.as_ref()?;
        let target = self.plan.target?;
        if self.payload >= self.plan.payloads.len() {
            self.point += 1;
            self.payload = 0;
        }
        let (point, seq) = self.plan.points.get(self.point)?;
        let payload = self.plan.payloads.get(self.payload)?;
        self.payload += 1;

        let vector = TestVector::new(
            template.clone(),
            point.clone(),
            payload.attack,
            PayloadInfo { seq: seq.clone(), feature: payload.expected.to_string() },
            vec![HookFilter::new(target.filter_type, target.filter_key, payload.expected)],
        );
        Some(vec![vector])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::telemetry::fixtures::{new_request, with_hooks};
    use serde_json::json;

    const TARGET: HookTarget = HookTarget { hook_type: "readFile", filter_type: "readFile", filter_key: "realpath" };
    const TABLE: PayloadTable = PayloadTable::uniform(&[
        Payload { attack: "a1", expected: "e1" },
        Payload { attack: "a2", expected: "e2" },
    ]);

    fn hooked() -> TelemetryEvent {
        TelemetryEvent::from_value(with_hooks(
            new_request(),
            json!([{ "hook_type": "readFile", "path": "report.txt", "realpath": "/srv/report.txt" }]),
        ))
        .unwrap()
    }

    #[test]
    fn test_json_leaves() {
        let leaves = json_leaves(&json!({ "a": [1, "x", null, true, 1.5], "b": { "c": "y" } }));
        let paths: Vec<_> = leaves.iter().map(|(p, v)| (p.clone(), v.as_str())).collect();
        assert_eq!(
            paths,
            vec![
                (vec![JsonKey::Key("a".into()), JsonKey::Index(0)], "1"),
                (vec![JsonKey::Key("a".into()), JsonKey::Index(1)], "x"),
                (vec![JsonKey::Key("b".into()), JsonKey::Key("c".into())], "y"),
            ]
        );
        assert_eq!(json_leaves(&json!("root")), vec![(Vec::new(), "root".to_string())]);
        assert!(json_leaves(&json!(true)).is_empty());
    }

    #[test]
    fn test_candidates_skip_standard_headers() {
        let mut value = new_request();
        value["context"]["header"]["x-file"] = json!("report.txt");
        value["context"]["header"]["Accept"] = json!("*/*");
        value["context"]["header"]["cookie"] = json!("sid=1");
        let event = TelemetryEvent::from_value(value).unwrap();
        let candidates = injection_candidates(&RequestTemplate::from_event(&event));
        let channels: Vec<_> = candidates.iter().map(|c| c.point.channel()).collect();
        assert_eq!(channels, vec!["query", "header", "header", "cookie"]);
        assert!(candidates.iter().all(|c| c.point != InjectionPoint::Header { name: "host".into() }));
        assert!(candidates.iter().any(|c| c.point == InjectionPoint::Header { name: "user-agent".into() }));
    }

    #[test]
    fn test_candidates_with_raw_body() {
        let mut value = new_request();
        value["context"]["header"]["content-type"] = json!("text/xml");
        value["context"]["body"] = json!(hex::encode("<?xml?><r/>"));
        let event = TelemetryEvent::from_value(value).unwrap();
        let template = RequestTemplate::from_event(&event);
        let candidates = injection_candidates_with_body(&template);
        let last = candidates.last().unwrap();
        assert_eq!(last.point, InjectionPoint::RawBody);
        assert_eq!(last.value, "<?xml?><r/>");
        assert_eq!(injection_candidates(&template).len() + 1, candidates.len());
    }

    #[test]
    fn test_build_over_skips_hook_gate() {
        let event = TelemetryEvent::from_value(new_request()).unwrap();
        let plan = MutationPlan::build_over(&event, TARGET, &TABLE, injection_candidates, |v| v == "report.txt");
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_payload_seq_shape() {
        let seq = payload_seq();
        assert_eq!(seq.len(), 32);
        assert!(seq.bytes().all(|b| SEQ_CHARSET.contains(&b)));
    }

    #[test]
    fn test_plan_without_hook_is_empty() {
        let event = TelemetryEvent::from_value(new_request()).unwrap();
        let plan = MutationPlan::build(&event, TARGET, &TABLE, |_| true);
        assert!(plan.is_empty());
        assert_eq!(plan.batches().count(), 0);
    }

    #[test]
    fn test_plan_is_restartable() {
        let event = hooked();
        let plan = MutationPlan::build(&event, TARGET, &TABLE, |v| v == "report.txt");
        assert_eq!(plan.len(), 2);

        let first: Vec<_> = plan.batches().flatten().collect();
        let second: Vec<_> = plan.batches().flatten().collect();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(first[0].payload, second[0].payload);
        // Same injection point shares one sequence id
        assert_eq!(first[0].payload.seq, first[1].payload.seq);
        assert_eq!(first[1].template.params["file"], "a2");
        assert_eq!(first[1].filters[0].filter["realpath"], "e2");
    }

    #[test]
    fn test_distinct_points_get_distinct_seq() {
        let mut value = with_hooks(
            new_request(),
            json!([{ "hook_type": "readFile", "path": "report.txt", "realpath": "/srv/report.txt" }]),
        );
        value["context"]["header"]["x-file"] = json!("report.txt");
        let event = TelemetryEvent::from_value(value).unwrap();
        let plan = MutationPlan::build(&event, TARGET, &TABLE, |v| v == "report.txt");
        let seqs: Vec<_> = plan.points().map(|(_, s)| s.to_string()).collect();
        assert_eq!(seqs.len(), 2);
        assert_ne!(seqs[0], seqs[1]);
        assert_eq!(plan.batches().count(), 4);
    }
}
