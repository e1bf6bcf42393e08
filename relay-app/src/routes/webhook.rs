use crate::relay::{InboundEvent, RelayOutcome};
use crate::server::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json};
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/webhook", post(receive_event))
}

/// Webhook delivery entry point. Terminal relay outcomes acknowledge with an
/// in-body status document; ignored and dropped deliveries acknowledge with
/// 204 and no body so the platform never retries them.
#[tracing::instrument(level = "info", skip_all)]
async fn receive_event(
    Extension(state): Extension<Arc<AppState>>,
    Json(event): Json<InboundEvent>,
) -> Response {
    if state.cfg.dev_mode {
        tracing::debug!(event = ?event, "inbound webhook event");
    }

    let Some(relay) = state.registration.current_relay().await else {
        return ack(StatusCode::SERVICE_UNAVAILABLE, "Bot is not configured");
    };

    match relay.process_event(event).await {
        RelayOutcome::ReplySent => ack(StatusCode::OK, "Reply sent"),
        RelayOutcome::EmptySpeech => ack(StatusCode::OK, "Received empty speech"),
        RelayOutcome::NluFailure => ack(StatusCode::OK, "Error while call to NLU"),
        RelayOutcome::Ignored(_) | RelayOutcome::Dropped(_) => {
            StatusCode::NO_CONTENT.into_response()
        }
    }
}

fn ack(code: StatusCode, message: &'static str) -> Response {
    let body = Json(serde_json::json!({
        "status": { "code": code.as_u16(), "message": message }
    }));
    (code, body).into_response()
}
