use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use crate::errors::IastError;

/// Header the scanner stamps on every replayed test request.
pub const SCAN_REQUEST_ID_HEADER: &str = "scan-request-id";

static HOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9.\-]+$").expect("host pattern is valid")
});

/// Isolation domain for dedup state and storage: `host_port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantKey(String);

impl TenantKey {
    pub fn new(host: &str, port: &str) -> Self {
        Self(format!("{}_{}", host, port))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `host:port` form used when building replay URLs.
    pub fn authority(&self) -> String {
        match self.0.rsplit_once('_') {
            Some((host, port)) => format!("{}:{}", host, port),
            None => self.0.clone(),
        }
    }
}

impl From<&str> for TenantKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TenantKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerOs {
    Linux,
    Windows,
    Mac,
}

impl ServerOs {
    /// Anything the agent reports besides Windows and Mac is treated as Linux-like.
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("Windows") => Self::Windows,
            Some("Mac") => Self::Mac,
            _ => Self::Linux,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Telemetry produced by a replayed test request, routed back to the scanner.
    ScanResult { queue_id: String },
    /// Organic traffic that may be stored for scanning.
    NewRequestCandidate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub json: Value,
    pub server: ServerInfo,
    /// Raw request body, hex encoded by the agent.
    pub body: String,
    pub method: String,
    pub querystring: String,
    pub path: String,
    pub parameter: BTreeMap<String, Vec<Value>>,
    pub header: BTreeMap<String, String>,
    pub nic: Vec<Value>,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "appBasePath", default, skip_serializing_if = "Option::is_none")]
    pub app_base_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One traced hook invocation. Fields beyond `hook_type` depend on the hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookInfo {
    pub hook_type: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HookToken {
    pub text: String,
    #[serde(default)]
    pub start: usize,
    pub stop: usize,
}

impl HookInfo {
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Lexer tokens reported for `sql` and `command` hooks.
    pub fn tokens(&self) -> Vec<HookToken> {
        self.fields
            .get("tokens")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|t| serde_json::from_value(t.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn env(&self) -> Vec<&str> {
        self.fields
            .get("env")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn stack_text(&self) -> Option<String> {
        let stack = self.fields.get("stack")?;
        match stack {
            Value::Array(frames) => Some(frames.iter().filter_map(Value::as_str).collect()),
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub filename: String,
}

/// Decoded record of the runtime hook activity of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_server: Option<WebServer>,
    pub context: RequestContext,
    pub hook_info: Vec<HookInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    fingerprint: Option<String>,
}

impl TelemetryEvent {
    /// Decode and validate an agent report.
    pub fn parse(data: &[u8]) -> Result<Self, IastError> {
        let value: Value = serde_json::from_slice(data)
            .map_err(|e| IastError::ResultJson(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, IastError> {
        let mut event: TelemetryEvent = serde_json::from_value(value)
            .map_err(|e| IastError::ResultInvalid(e.to_string()))?;
        if event.scan_request_id().is_none() {
            event.normalize_host()?;
        }
        Ok(event)
    }

    fn normalize_host(&mut self) -> Result<(), IastError> {
        let request_id = self.context.request_id.clone();
        let server = self.web_server.as_mut().ok_or_else(|| {
            IastError::ResultHost(format!("missing web_server in request {}", request_id))
        })?;
        if server.port.is_none() {
            return Err(IastError::ResultHost(format!("missing web_server.port in request {}", request_id)));
        }
        let host = server
            .host
            .as_deref()
            .ok_or_else(|| IastError::ResultHost(format!("missing web_server.host in request {}", request_id)))?
            .replace('_', "-");
        if !HOST_RE.is_match(&host) {
            return Err(IastError::ResultHost(format!("invalid host '{}' in request {}", host, request_id)));
        }
        server.host = Some(host);
        Ok(())
    }

    pub fn request_id(&self) -> &str {
        &self.context.request_id
    }

    pub fn scan_request_id(&self) -> Option<&str> {
        self.header(SCAN_REQUEST_ID_HEADER).filter(|v| !v.is_empty())
    }

    /// Queue id is the part of the scan request id before the first `-`.
    pub fn result_queue_id(&self) -> Option<&str> {
        self.scan_request_id().and_then(|id| id.split('-').next())
    }

    pub fn kind(&self) -> EventKind {
        match self.result_queue_id() {
            Some(queue_id) => EventKind::ScanResult { queue_id: queue_id.to_string() },
            None => EventKind::NewRequestCandidate,
        }
    }

    pub fn tenant(&self) -> Result<TenantKey, IastError> {
        let server = self.web_server.as_ref().ok_or_else(|| {
            IastError::ResultHost(format!("request {} has no web_server", self.request_id()))
        })?;
        let host = server.host.as_deref().ok_or_else(|| {
            IastError::ResultHost(format!("request {} has no web_server.host", self.request_id()))
        })?;
        let port = match &server.port {
            Some(Value::String(p)) => p.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(IastError::ResultHost(format!(
                    "request {} has no usable web_server.port",
                    self.request_id()
                )))
            }
        };
        Ok(TenantKey::new(host, &port))
    }

    pub fn server_os(&self) -> ServerOs {
        ServerOs::from_label(self.context.server.os.as_deref())
    }

    pub fn method(&self) -> String {
        self.context.method.to_lowercase()
    }

    pub fn path(&self) -> &str {
        &self.context.path
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.context.header
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.context
            .header
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn cookies(&self) -> Option<&str> {
        self.header("cookie")
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }

    pub fn parameters(&self) -> &BTreeMap<String, Vec<Value>> {
        &self.context.parameter
    }

    pub fn json_body(&self) -> &Value {
        &self.context.json
    }

    pub fn body_bytes(&self) -> Option<Vec<u8>> {
        hex::decode(&self.context.body).ok()
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        parse_query(&self.context.querystring)
    }

    /// Query parameters as a flat map. The first occurrence of a repeated name
    /// wins unless the agent reported a string value for it.
    pub fn query_param_dict(&self) -> BTreeMap<String, String> {
        let mut result = BTreeMap::new();
        for (name, value) in self.query_pairs() {
            if !result.contains_key(&name) {
                result.insert(name, value);
            } else if let Some(reported) = self
                .context
                .parameter
                .get(&name)
                .and_then(|values| values.first())
                .and_then(Value::as_str)
            {
                result.insert(name, reported.to_string());
            }
        }
        result
    }

    /// Form fields: parameters that did not come from the query string.
    pub fn post_data_dict(&self) -> BTreeMap<String, String> {
        let query_names: Vec<String> = self.query_pairs().into_iter().map(|(k, _)| k).collect();
        let mut result = BTreeMap::new();
        for (name, values) in &self.context.parameter {
            let first = values.first().and_then(Value::as_str);
            if !query_names.contains(name) && first.is_some() {
                result.insert(name.clone(), first.unwrap_or_default().to_string());
            } else if values.len() == 2 {
                if let Some(second) = values[1].as_str() {
                    result.insert(name.clone(), second.to_string());
                }
            }
        }
        result
    }

    pub fn has_hook_type(&self, hook_type: &str) -> bool {
        self.hook_info.iter().any(|h| h.hook_type == hook_type)
    }

    pub fn hooks<'a>(&'a self, hook_type: &'a str) -> impl Iterator<Item = &'a HookInfo> + 'a {
        self.hook_info.iter().filter(move |h| h.hook_type == hook_type)
    }

    pub fn upload_files(&self) -> Vec<UploadFile> {
        self.hooks("fileUpload")
            .map(|h| UploadFile {
                name: h.str_field("name").unwrap_or_default().to_string(),
                filename: h.str_field("filename").unwrap_or_default().to_string(),
            })
            .collect()
    }

    /// Shape signature of the JSON body, independent of its values.
    pub fn json_struct(&self) -> String {
        let mut result = String::new();
        let mut stack = vec![&self.context.json];
        while let Some(current) = stack.pop() {
            match current {
                Value::Null => result.push_str("N|"),
                Value::Number(n) if n.is_i64() || n.is_u64() => result.push_str("I|"),
                Value::String(_) => result.push_str("S|"),
                Value::Array(items) => {
                    stack.extend(items.iter());
                    result.push_str(&format!("L:{}|", items.len()));
                }
                Value::Object(map) => {
                    let keys: Vec<String> = map.keys().map(|k| k.replace(',', "\\,")).collect();
                    stack.extend(map.values());
                    result.push_str(&format!("D:{},|", keys.join(",")));
                }
                _ => {}
            }
        }
        result
    }

    /// Hash over the call stacks of every hook invocation.
    pub fn all_stack_hash(&self) -> String {
        let joined: String = self.hook_info.iter().filter_map(HookInfo::stack_text).collect();
        hex::encode(Sha256::digest(joined.as_bytes()))
    }

    /// URL used to replay this request against the tenant.
    pub fn scan_url(&self) -> String {
        let original = self.context.url.as_deref().unwrap_or_default();
        match self.tenant() {
            Ok(tenant) => {
                let scheme = if original.starts_with("https") { "https" } else { "http" };
                format!("{}://{}{}", scheme, tenant.authority(), self.context.path)
            }
            Err(_) => original.to_string(),
        }
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn set_fingerprint(&mut self, fingerprint: String) {
        self.fingerprint = Some(fingerprint);
    }

    pub fn dump(&self) -> Result<String, IastError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn parse_query(querystring: &str) -> Vec<(String, String)> {
    if querystring.is_empty() {
        return Vec::new();
    }
    let Ok(mut url) = Url::parse("http://localhost/") else {
        return Vec::new();
    };
    url.set_query(Some(querystring));
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
