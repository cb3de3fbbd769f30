use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IastConfig {
    pub preprocessor: PreprocessorConfig,
    pub database: DatabaseConfig,
    pub dedup: DedupConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PreprocessorConfig {
    pub http_host: String,
    pub http_port: u16,
    pub api_path: String,
    /// Capacity of each tenant's dedup set.
    pub request_lru_size: usize,
    /// Largest accepted request body, in bytes.
    pub max_buffer_size: usize,
    pub model_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    /// Bearer token required by admin routes. Unset leaves them open.
    pub api_token: Option<String>,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 25931,
            api_path: "/openrasp-result".to_string(),
            request_lru_size: 1024,
            max_buffer_size: 10 * 1024 * 1024,
            model_ttl_secs: 180,
            sweep_interval_secs: 30,
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "./data/iastgate.db".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DedupConfig {
    /// URL path fragments that are never persisted.
    pub drop_paths: Vec<String>,
}
