use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use crate::api::AppState;

/// Gate admin routes behind `Authorization: Bearer <api_token>` when a
/// token is configured.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    if let Some(expected) = state.api_token.as_deref().filter(|t| !t.is_empty()) {
        let auth_header = request.headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) if token == expected => {}
            Some(_) => {
                warn!(path = %request.uri().path(), "Rejected admin request with invalid token");
                return Err((StatusCode::UNAUTHORIZED, Json(json!({"error": "Invalid API token"}))));
            }
            None => {
                warn!(path = %request.uri().path(), "Rejected admin request without token");
                return Err((StatusCode::UNAUTHORIZED, Json(json!({"error": "Missing Authorization header"}))));
            }
        }
    }

    Ok(next.run(request).await)
}
