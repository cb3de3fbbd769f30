use axum::Json;
use crate::plugins::{PluginInfo, SCAN_PLUGINS};

pub async fn list_plugins() -> Json<Vec<&'static PluginInfo>> {
    Json(SCAN_PLUGINS.infos())
}
