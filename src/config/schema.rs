use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "preprocessor": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "http_host": { "type": "string", "minLength": 1 },
                    "http_port": { "type": "integer", "minimum": 0, "maximum": 65535 },
                    "api_path": { "type": "string", "minLength": 1 },
                    "request_lru_size": { "type": "integer", "minimum": 1 },
                    "max_buffer_size": { "type": "integer", "minimum": 1 },
                    "model_ttl_secs": { "type": "integer", "minimum": 1 },
                    "sweep_interval_secs": { "type": "integer", "minimum": 1 },
                    "api_token": { "type": "string" }
                }
            },
            "database": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "path": { "type": "string", "minLength": 1 }
                }
            },
            "dedup": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "drop_paths": { "type": "array", "items": { "type": "string" } }
                }
            }
        }
    })
});
