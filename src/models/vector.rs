use std::collections::BTreeMap;
use data_encoding::BASE64;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use crate::models::telemetry::{TelemetryEvent, SCAN_REQUEST_ID_HEADER};

/// Header carrying the base64 JSON hook filters for the agent.
pub const HOOK_FILTER_HEADER: &str = "x-iast-filter";

/// Cookie values keep unreserved characters and `/`.
const COOKIE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

const HTTP_METHODS: &[&str] = &["get", "post", "head", "put", "push", "delete", "options", "patch"];

/// One step of a JSON path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonKey {
    Index(usize),
    Key(String),
}

/// Where a payload is placed in the replayed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum InjectionPoint {
    Query { name: String },
    Body { name: String },
    Json { path: Vec<JsonKey> },
    Header { name: String },
    Cookie { name: String },
    /// The whole request body, for bodies that are neither form nor JSON.
    RawBody,
}

impl InjectionPoint {
    pub fn channel(&self) -> &'static str {
        match self {
            InjectionPoint::Query { .. } => "query",
            InjectionPoint::Body { .. } => "body",
            InjectionPoint::Json { .. } => "json",
            InjectionPoint::Header { .. } => "header",
            InjectionPoint::Cookie { .. } => "cookie",
            InjectionPoint::RawBody => "raw",
        }
    }
}

/// Correlation data shared by every vector tested at one injection point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadInfo {
    pub seq: String,
    pub feature: String,
}

/// Restricts which hook reports the agent sends back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookFilter {
    #[serde(rename = "type")]
    pub hook_type: String,
    pub filter: Map<String, Value>,
}

impl HookFilter {
    pub fn new(hook_type: &str, key: &str, expected: &str) -> Self {
        let mut filter = Map::new();
        filter.insert(key.to_string(), Value::String(expected.to_string()));
        Self {
            hook_type: hook_type.to_string(),
            filter,
        }
    }
}

/// HTTP request rebuilt from a telemetry event, ready to be mutated.
#[derive(Debug, Clone, Serialize)]
pub struct RequestTemplate {
    pub method: String,
    pub url: String,
    pub content_type: String,
    pub headers: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    pub data: BTreeMap<String, String>,
    pub cookies: Option<BTreeMap<String, String>>,
    pub json: Option<Value>,
    pub body: Option<Vec<u8>>,
}

impl RequestTemplate {
    pub fn from_event(event: &TelemetryEvent) -> Self {
        let mut method = event.method();
        if !HTTP_METHODS.contains(&method.as_str()) {
            warn!(request_id = %event.request_id(), method = %method, "Invalid HTTP method, replaying as POST");
            method = "post".to_string();
        }

        let content_type = event.content_type().to_string();
        let mut data = BTreeMap::new();
        let mut json = None;
        let mut body = None;
        if content_type.starts_with("application/x-www-form-urlencoded")
            || content_type.starts_with("multipart/form-data")
        {
            data = event.post_data_dict();
        } else if content_type.starts_with("application/json") {
            json = Some(event.json_body().clone());
        } else {
            body = event.body_bytes();
        }

        let headers = event
            .headers()
            .iter()
            .filter(|(k, _)| {
                let lower = k.to_lowercase();
                lower != "cookie" && lower != "content-length"
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            method,
            url: event.scan_url(),
            content_type,
            headers,
            params: event.query_param_dict(),
            data,
            cookies: event.cookies().map(parse_cookies),
            json,
            body,
        }
    }

    /// Overwrite (or create) the value at `point`.
    pub fn set(&mut self, point: &InjectionPoint, value: &str) {
        match point {
            InjectionPoint::Query { name } => {
                self.params.insert(name.clone(), value.to_string());
            }
            InjectionPoint::Body { name } => {
                self.data.insert(name.clone(), value.to_string());
            }
            InjectionPoint::Header { name } => {
                self.headers.insert(name.clone(), value.to_string());
            }
            InjectionPoint::Cookie { name } => {
                self.cookies
                    .get_or_insert_with(BTreeMap::new)
                    .insert(name.clone(), quote(value));
            }
            InjectionPoint::Json { path } => {
                let root = self.json.get_or_insert(Value::Null);
                set_json_path(root, path, Value::String(value.to_string()));
            }
            InjectionPoint::RawBody => {
                self.body = Some(value.as_bytes().to_vec());
            }
        }
    }

    pub fn get(&self, point: &InjectionPoint) -> Option<String> {
        match point {
            InjectionPoint::Query { name } => self.params.get(name).cloned(),
            InjectionPoint::Body { name } => self.data.get(name).cloned(),
            InjectionPoint::Header { name } => self.headers.get(name).cloned(),
            InjectionPoint::Cookie { name } => self.cookies.as_ref()?.get(name).cloned(),
            InjectionPoint::Json { path } => {
                let mut current = self.json.as_ref()?;
                for key in path {
                    current = match key {
                        JsonKey::Key(k) => current.get(k)?,
                        JsonKey::Index(i) => current.get(*i)?,
                    };
                }
                match current {
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                }
            }
            InjectionPoint::RawBody => {
                self.body.as_deref().map(|b| String::from_utf8_lossy(b).into_owned())
            }
        }
    }
}

fn set_json_path(root: &mut Value, path: &[JsonKey], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };
    let mut current = root;
    for (i, key) in parents.iter().enumerate() {
        current = slot(current, key);
        if current.is_null() {
            *current = match path[i + 1] {
                JsonKey::Index(_) => Value::Array(Vec::new()),
                JsonKey::Key(_) => Value::Object(Map::new()),
            };
        }
    }
    *slot(current, last) = value;
}

/// Child slot for `key`, reshaping `target` into the matching container.
fn slot<'a>(target: &'a mut Value, key: &JsonKey) -> &'a mut Value {
    match key {
        JsonKey::Key(k) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            &mut target[k.as_str()]
        }
        JsonKey::Index(i) => {
            if !target.is_array() {
                *target = Value::Array(Vec::new());
            }
            if let Some(items) = target.as_array_mut() {
                while items.len() <= *i {
                    items.push(Value::Null);
                }
            }
            &mut target[*i]
        }
    }
}

pub fn parse_cookies(raw: &str) -> BTreeMap<String, String> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

fn quote(value: &str) -> String {
    utf8_percent_encode(value, COOKIE_ENCODE_SET).to_string()
}

/// One synthesized request: a template with a payload placed at one point.
#[derive(Debug, Clone)]
pub struct TestVector {
    pub template: RequestTemplate,
    pub point: InjectionPoint,
    pub payload: PayloadInfo,
    pub filters: Vec<HookFilter>,
    result: Option<TelemetryEvent>,
}

impl TestVector {
    pub fn new(
        mut template: RequestTemplate,
        point: InjectionPoint,
        attack: &str,
        payload: PayloadInfo,
        filters: Vec<HookFilter>,
    ) -> Self {
        template.set(&point, attack);
        let encoded = serde_json::to_vec(&filters)
            .map(|bytes| BASE64.encode(&bytes))
            .unwrap_or_default();
        template.headers.insert(HOOK_FILTER_HEADER.to_string(), encoded);
        Self {
            template,
            point,
            payload,
            filters,
            result: None,
        }
    }

    pub fn feature(&self) -> &str {
        &self.payload.feature
    }

    /// Stamp a fresh `scan-request-id` routed to result queue `queue_id`.
    pub fn assign_scan_request_id(&mut self, queue_id: &str) -> String {
        let id = format!("{}-{}", queue_id, uuid::Uuid::new_v4());
        self.template
            .headers
            .insert(SCAN_REQUEST_ID_HEADER.to_string(), id.clone());
        id
    }

    pub fn attach_result(&mut self, event: TelemetryEvent) {
        self.result = Some(event);
    }

    pub fn result(&self) -> Option<&TelemetryEvent> {
        self.result.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::telemetry::fixtures::new_request;
    use serde_json::json;

    fn event(value: Value) -> TelemetryEvent {
        TelemetryEvent::from_value(value).unwrap()
    }

    #[test]
    fn test_template_from_get_request() {
        let mut value = new_request();
        value["context"]["header"]["cookie"] = json!("sid=abc; theme=\"dark\"");
        value["context"]["header"]["content-length"] = json!("0");
        let template = RequestTemplate::from_event(&event(value));
        assert_eq!(template.method, "get");
        assert_eq!(template.params["file"], "report.txt");
        assert!(!template.headers.contains_key("cookie"));
        assert!(!template.headers.contains_key("content-length"));
        let cookies = template.cookies.unwrap();
        assert_eq!(cookies["sid"], "abc");
        assert_eq!(cookies["theme"], "dark");
    }

    #[test]
    fn test_invalid_method_replayed_as_post() {
        let mut value = new_request();
        value["context"]["method"] = json!("TRACE");
        assert_eq!(RequestTemplate::from_event(&event(value)).method, "post");
    }

    #[test]
    fn test_json_body_template() {
        let mut value = new_request();
        value["context"]["header"]["content-type"] = json!("application/json");
        value["context"]["json"] = json!({ "a": { "b": ["x", "y"] } });
        let mut template = RequestTemplate::from_event(&event(value));
        let point = InjectionPoint::Json {
            path: vec![JsonKey::Key("a".into()), JsonKey::Key("b".into()), JsonKey::Index(1)],
        };
        template.set(&point, "payload");
        assert_eq!(template.json.as_ref().unwrap()["a"]["b"][1], "payload");
        assert_eq!(template.get(&point).as_deref(), Some("payload"));
    }

    #[test]
    fn test_json_set_creates_missing_containers() {
        let mut root = json!({});
        set_json_path(
            &mut root,
            &[JsonKey::Key("list".into()), JsonKey::Index(0), JsonKey::Key("k".into())],
            json!("v"),
        );
        assert_eq!(root, json!({ "list": [{ "k": "v" }] }));
    }

    #[test]
    fn test_json_empty_path_replaces_root() {
        let mut root = json!("old");
        set_json_path(&mut root, &[], json!("new"));
        assert_eq!(root, json!("new"));
    }

    #[test]
    fn test_cookie_values_are_quoted() {
        let mut template = RequestTemplate::from_event(&event(new_request()));
        template.set(&InjectionPoint::Cookie { name: "sid".into() }, "../etc passwd");
        assert_eq!(template.cookies.unwrap()["sid"], "../etc%20passwd");
    }

    #[test]
    fn test_cookie_quote_keeps_unreserved() {
        assert_eq!(quote("a-b_c.d~e/f"), "a-b_c.d~e/f");
        assert_eq!(quote("x=1;y"), "x%3D1%3By");
        assert_eq!(quote("报"), "%E6%8A%A5");
    }

    #[test]
    fn test_raw_body_point() {
        let mut value = new_request();
        value["context"]["header"]["content-type"] = json!("application/xml");
        value["context"]["body"] = json!(hex::encode("<?xml version=\"1.0\"?><a/>"));
        let mut template = RequestTemplate::from_event(&event(value));
        assert!(template.get(&InjectionPoint::RawBody).unwrap().starts_with("<?xml"));
        template.set(&InjectionPoint::RawBody, "<b/>");
        assert_eq!(template.body.as_deref(), Some(&b"<b/>"[..]));
        assert_eq!(InjectionPoint::RawBody.channel(), "raw");
    }

    #[test]
    fn test_vector_sets_filter_header() {
        let template = RequestTemplate::from_event(&event(new_request()));
        let vector = TestVector::new(
            template,
            InjectionPoint::Query { name: "file".into() },
            "/etc/passwd",
            PayloadInfo { seq: "SEQ".into(), feature: "/etc/passwd".into() },
            vec![HookFilter::new("readFile", "realpath", "/etc/passwd")],
        );
        assert_eq!(vector.template.params["file"], "/etc/passwd");
        let encoded = &vector.template.headers[HOOK_FILTER_HEADER];
        let decoded: Value = serde_json::from_slice(&BASE64.decode(encoded.as_bytes()).unwrap()).unwrap();
        assert_eq!(decoded, json!([{ "type": "readFile", "filter": { "realpath": "/etc/passwd" } }]));
    }

    #[test]
    fn test_assign_scan_request_id() {
        let template = RequestTemplate::from_event(&event(new_request()));
        let mut vector = TestVector::new(
            template,
            InjectionPoint::Header { name: "x-file".into() },
            "a",
            PayloadInfo { seq: "S".into(), feature: "a".into() },
            Vec::new(),
        );
        let id = vector.assign_scan_request_id("12");
        assert!(id.starts_with("12-"));
        assert_eq!(vector.template.headers[SCAN_REQUEST_ID_HEADER], id);
        assert!(vector.result().is_none());
    }
}
