use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::info;
use crate::api::AppState;
use crate::errors::IastError;
use crate::ingest::AdminAction;

pub async fn flush(
    State(state): State<AppState>,
    Json(action): Json<AdminAction>,
) -> Result<Json<Value>, IastError> {
    let tenants = action.lru_clean.len();
    state.admin.submit(action)?;
    info!(tenants, "Queued dedup flush");
    Ok(Json(json!({"status": 0, "msg": "ok"})))
}
