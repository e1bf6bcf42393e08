use crate::server::AppState;
use axum::routing::get;
use axum::{Extension, Json};
use chrono::Utc;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/health", get(get_health))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn get_health(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    let relay = state.registration.current_relay().await;

    Json(serde_json::json!({
        "status": "ok",
        "state": state.registration.status_label().await,
        "configured": state.registration.is_configured().await,
        "active_sessions": relay.map(|r| r.sessions().len()),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "checked_at": Utc::now(),
    }))
}
