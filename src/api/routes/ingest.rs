use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use serde_json::{json, Value};
use crate::api::AppState;
use crate::errors::IastError;
use crate::ingest::Envelope;

const BANNER_TEXT: &str = "IAST ingestion server is running.\n\
This interface is used by instrumented agents to report telemetry and should not be accessed with a browser.\n";

pub async fn banner() -> &'static str {
    BANNER_TEXT
}

pub async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, IastError> {
    let envelope = Envelope {
        content_type: headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        content_encoding: headers.get(header::CONTENT_ENCODING).and_then(|v| v.to_str().ok()),
    };
    state.router.handle(&body, envelope).await?;
    Ok(Json(json!({"status": 0, "msg": "ok"})))
}
