use thiserror::Error;

#[derive(Debug, Error)]
pub enum IastError {
    #[error("Content type invalid: {0}")]
    ContentTypeInvalid(String),

    #[error("Rasp result json decode error: {0}")]
    ResultJson(String),

    #[error("Rasp result format is invalid: {0}")]
    ResultInvalid(String),

    #[error("Rasp result host error: {0}")]
    ResultHost(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Result queue does not exist: {0}")]
    QueueNotExist(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bind error: {0}")]
    Bind(String),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
