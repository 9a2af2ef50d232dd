use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::utils::logging::*;
use crate::AppState;

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    log_health_check();

    let token_valid = state.token_manager.current_token().await.is_some();

    Json(json!({
        "status": "healthy",
        "service": "amocrm-sheets-sync",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "amocrm": {
            "domain": state.settings.amocrm.bare_domain(),
            "token_valid": token_valid
        },
        "sync": {
            "enabled": state.settings.sync.enabled,
            "interval_seconds": state.settings.sync.interval_seconds,
            "cursor": state.sync_job.cursor()
        }
    }))
}
