use std::path::Path;
use crate::errors::IastError;
use super::types::IastConfig;
use super::schema::CONFIG_SCHEMA;
use tracing::debug;

pub async fn parse_config(path: &Path) -> Result<IastConfig, IastError> {
    if !path.exists() {
        return Err(IastError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(IastError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config = parse_config_str(&content)?;
    debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

pub fn parse_config_str(content: &str) -> Result<IastConfig, IastError> {
    let mut yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    // An empty document means all defaults
    if yaml.is_null() {
        yaml = serde_yaml::Value::Mapping(Default::default());
    }

    // JSON Schema validation
    validate_schema(&yaml)?;

    // Parse into typed config
    let config: IastConfig = serde_yaml::from_value(yaml)?;

    // Semantic checks
    validate_semantics(&config)?;

    Ok(config)
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), IastError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| IastError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| IastError::Config(format!("Schema compilation error: {}", e)))?;

    let result = compiled.validate(&json_value);
    if let Err(errors) = result {
        let messages: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        if !messages.is_empty() {
            return Err(IastError::Config(format!("Invalid config: {}", messages.join("; "))));
        }
    }

    Ok(())
}

fn validate_semantics(config: &IastConfig) -> Result<(), IastError> {
    let pre = &config.preprocessor;
    if !pre.api_path.starts_with('/') {
        return Err(IastError::Config(format!("api_path '{}' must start with '/'", pre.api_path)));
    }
    if pre.request_lru_size == 0 {
        return Err(IastError::Config("request_lru_size must be at least 1".into()));
    }
    if pre.model_ttl_secs == 0 {
        return Err(IastError::Config("model_ttl_secs must be at least 1".into()));
    }
    Ok(())
}
