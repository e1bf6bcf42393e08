//! chatrelay server.
//!
//! Binds the HTTP listener, bootstraps registration from the persisted
//! config or the configured acquisition strategy, and mounts the routes.

use crate::config::AppConfig;
use crate::config_store::ConfigStore;
use crate::registration::RegistrationController;
use crate::routes;
use anyhow::Result;
use axum::Extension;
use axum::http::HeaderMap;
use axum::http::Request;
use axum::http::StatusCode;
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub cfg: AppConfig,
    pub registration: Arc<RegistrationController>,
    pub started_at: Instant,
}

pub async fn serve() -> Result<()> {
    let cfg = AppConfig::from_env()?;
    let started_at = Instant::now();
    let addr = cfg.bind_addr();
    tracing::info!(
        bind_addr = %addr,
        public_base_url = %cfg.public_base_url,
        webhook_url = %cfg.webhook_url(),
        auth_mode = %cfg.platform_auth.mode_label(),
        nlu_language = %cfg.nlu_language,
        dev_mode = cfg.dev_mode,
        data_dir = %cfg.data_dir.display(),
        http_timeout_seconds = cfg.http_timeout_seconds,
        http_max_in_flight = cfg.http_max_in_flight,
        "server configuration loaded"
    );
    let listener = preflight_bind_listener(addr).await?;

    let store = ConfigStore::new(&cfg.data_dir);
    let registration = Arc::new(RegistrationController::new(cfg.clone(), store));
    registration.bootstrap().await?;

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        registration,
        started_at,
    });

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
                request_id = %request_id_from_headers(request.headers())
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id_from_headers(request.headers()),
                "http request started"
            );
        })
        .on_response(
            |response: &Response, latency: Duration, _span: &tracing::Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "http request completed"
                );
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                tracing::error!(
                    error_class = %error,
                    latency_ms = latency.as_millis() as u64,
                    "http request failed"
                );
            },
        );

    let app = routes::router()
        .layer(Extension(state.clone()))
        .layer(GlobalConcurrencyLimitLayer::new(cfg.http_max_in_flight))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(cfg.http_timeout_seconds),
        ))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    tracing::info!(%addr, "chatrelay serving");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Session ids live in memory only; whatever is active now is gone after restart.
    if let Some(relay) = state.registration.current_relay().await {
        let sessions = relay.sessions();
        if !sessions.is_empty() {
            tracing::info!(
                active_sessions = sessions.len(),
                "discarding in-memory sessions"
            );
        }
    }
    tracing::info!("http server shutdown completed");

    Ok(())
}

pub async fn doctor() -> Result<()> {
    let cfg = AppConfig::from_env()?;
    let store = ConfigStore::new(&cfg.data_dir);
    let persisted = store.load().await?;
    tracing::info!(
        public_base_url = %cfg.public_base_url,
        webhook_url = %cfg.webhook_url(),
        auth_mode = %cfg.platform_auth.mode_label(),
        nlu_language = %cfg.nlu_language,
        dev_mode = cfg.dev_mode,
        data_dir = %cfg.data_dir.display(),
        persisted_config = persisted.is_some(),
        "config ok"
    );
    Ok(())
}

pub async fn register() -> Result<()> {
    let cfg = AppConfig::from_env()?;
    let store = ConfigStore::new(&cfg.data_dir);
    let controller = RegistrationController::new(cfg.clone(), store);
    controller.force_register().await?;
    tracing::info!(target_url = %cfg.webhook_url(), "webhook re-registered");
    Ok(())
}

async fn preflight_bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    tracing::info!(%addr, "preflight bind check starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("preflight bind failed for {addr}: {e}"))?;
    tracing::info!(%addr, "preflight bind check passed");
    Ok(listener)
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "missing".to_string())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        } else {
            tracing::warn!("received ctrl-c; beginning graceful shutdown");
        }
    }
}
