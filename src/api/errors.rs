use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use crate::errors::IastError;

impl IntoResponse for IastError {
    fn into_response(self) -> axum::response::Response {
        if self.is_expected() {
            (StatusCode::OK, Json(json!({"status": 1, "msg": "data invalid"}))).into_response()
        } else {
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
