use axum::{extract::State, Json};
use crate::api::AppState;
use crate::ingest::StatsSnapshot;

pub async fn get_stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.router.stats().snapshot())
}
