pub mod auth;
pub mod errors;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use crate::config::IastConfig;
use crate::db::Database;
use crate::dedup::{DedupCache, DefaultFingerprint};
use crate::ingest::{admin_channel, AdminHandle, IngestionRouter, ModelRegistry, ResultChannels, IngestStats};

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<IngestionRouter>,
    pub admin: AdminHandle,
    pub api_token: Option<String>,
}

/// Wire the ingestion pipeline over `db` using the preprocessor settings.
pub fn create_app_state(db: Database, config: &IastConfig) -> AppState {
    let pre = &config.preprocessor;
    let cache = Arc::new(DedupCache::new(pre.request_lru_size));
    let registry = Arc::new(ModelRegistry::with_ttl(
        Arc::new(db),
        cache.clone(),
        Duration::from_secs(pre.model_ttl_secs),
    ));
    let strategy = Arc::new(DefaultFingerprint::new(config.dedup.drop_paths.clone()));
    let (admin, queue) = admin_channel();

    let router = IngestionRouter::new(
        cache,
        registry,
        strategy,
        Arc::new(ResultChannels::new()),
        Arc::new(IngestStats::default()),
        queue,
    );
    AppState { router: Arc::new(router), admin, api_token: pre.api_token.clone() }
}

pub fn build_router(state: AppState, api_path: &str, max_body: usize) -> Router {
    let admin = Router::new()
        .route("/api/admin/flush", post(routes::admin::flush))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::admin_auth_middleware));

    Router::new()
        .route(api_path, get(routes::ingest::banner).post(routes::ingest::ingest))
        .merge(admin)
        .route("/api/stats", get(routes::stats::get_stats))
        .route("/api/plugins", get(routes::plugins::list_plugins))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
