use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use crate::api;
use crate::cli::commands::ServeArgs;
use crate::config::{parse_config, IastConfig};
use crate::db::Database;
use crate::errors::IastError;
use crate::ingest::ModelRegistry;

/// Overrides `preprocessor.api_token` from the config file.
const API_TOKEN_ENV: &str = "IASTGATE_API_TOKEN";

pub async fn handle_serve(args: ServeArgs) -> Result<(), IastError> {
    let mut config = match &args.config {
        Some(path) => parse_config(Path::new(path)).await?,
        None => IastConfig::default(),
    };
    apply_overrides(&mut config, &args);
    let pre = &config.preprocessor;

    info!(db = %config.database.path, "Opening request store");
    let db = Database::new(&config.database.path)?;
    let state = api::create_app_state(db, &config);
    let app = api::build_router(state.clone(), &pre.api_path, pre.max_buffer_size);

    let addr = format!("{}:{}", pre.http_host, pre.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| IastError::Bind(format!("{}: {}", addr, e)))?;
    info!(addr = %addr, api_path = %pre.api_path, "Listening");

    let cancel = CancellationToken::new();
    let sweeper = tokio::spawn(run_sweeper(
        state.router.registry().clone(),
        Duration::from_secs(pre.sweep_interval_secs),
        cancel.clone(),
    ));

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            shutdown.cancel();
        })
        .await
        .map_err(|e| IastError::Internal(format!("Server error: {}", e)))?;

    cancel.cancel();
    let _ = sweeper.await;
    info!("Server stopped");
    Ok(())
}

fn apply_overrides(config: &mut IastConfig, args: &ServeArgs) {
    if let Some(host) = &args.host {
        config.preprocessor.http_host = host.clone();
    }
    if let Some(port) = args.port {
        config.preprocessor.http_port = port;
    }
    if let Some(db) = &args.db {
        config.database.path = db.clone();
    }
    if let Ok(token) = std::env::var(API_TOKEN_ENV) {
        config.preprocessor.api_token = Some(token);
    }
}

/// Evict idle store handles until cancelled.
async fn run_sweeper(registry: Arc<ModelRegistry>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let expired = registry.sweep();
                if !expired.is_empty() {
                    info!(count = expired.len(), "Evicted idle request stores");
                }
            }
        }
    }
    debug!("Sweeper stopped");
}
