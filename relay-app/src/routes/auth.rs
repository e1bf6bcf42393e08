use crate::server::AppState;
use axum::Extension;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct AuthQuery {
    code: Option<String>,
    error: Option<String>,
}

pub fn router() -> axum::Router {
    axum::Router::new().route("/auth", get(complete_authorization))
}

/// OAuth redirect target. The installer's browser lands here once the grant
/// is approved; the page it gets back is for a human, so failures render as
/// HTML rather than a JSON error document.
#[tracing::instrument(level = "info", skip_all)]
async fn complete_authorization(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<AuthQuery>,
) -> Response {
    if let Some(error) = query.error {
        tracing::warn!(error = %error, "authorization was declined by the provider");
        return page(
            StatusCode::OK,
            "Authorization declined",
            &format!("The platform reported: {}.", escape_html(&error)),
        );
    }

    let Some(code) = query.code else {
        return page(
            StatusCode::OK,
            "chatrelay",
            "This endpoint completes the platform authorization redirect.",
        );
    };

    match state.registration.handle_authorization_code(&code).await {
        Ok(()) => page(
            StatusCode::OK,
            "Setup complete",
            "The bot is registered and ready to relay messages.",
        ),
        Err(e) => {
            tracing::error!(error = %e, "authorization code handling failed");
            page(
                StatusCode::BAD_GATEWAY,
                "Setup failed",
                &escape_html(&e.to_string()),
            )
        }
    }
}

fn page(code: StatusCode, title: &str, body: &str) -> Response {
    let html = format!(
        "<!doctype html><html><head><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{body}</p></body></html>"
    );
    (code, Html(html)).into_response()
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, PlatformAuth};
    use crate::config_store::ConfigStore;
    use crate::registration::RegistrationController;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use std::path::Path;
    use std::time::Instant;
    use tower::ServiceExt;

    fn test_config(server_url: &str, dir: &Path) -> AppConfig {
        AppConfig {
            port: 5000,
            public_base_url: "https://relay.example.com".to_string(),
            nlu_access_token: "nlu-token".to_string(),
            nlu_language: "en".to_string(),
            nlu_api_base: Some(server_url.to_string()),
            platform_auth: PlatformAuth::OAuth {
                client_id: "cid".to_string(),
                client_secret: "secret".to_string(),
            },
            platform_api_base: Some(server_url.to_string()),
            dev_mode: false,
            data_dir: dir.to_path_buf(),
            http_timeout_seconds: 30,
            http_max_in_flight: 256,
        }
    }

    /// Controller bootstrapped with oauth credentials and nothing persisted,
    /// so it sits in the awaiting state.
    async fn awaiting_state(server_url: &str, dir: &Path) -> Arc<AppState> {
        let cfg = test_config(server_url, dir);
        let registration = RegistrationController::new(cfg.clone(), ConfigStore::new(dir));
        registration.bootstrap().await.expect("bootstrap succeeds");
        Arc::new(AppState {
            registration: Arc::new(registration),
            cfg,
            started_at: Instant::now(),
        })
    }

    async fn fetch(app: axum::Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("handler runs");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    #[tokio::test]
    async fn declined_grant_renders_the_provider_error() {
        let server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let app = router().layer(Extension(awaiting_state(&server.url(), dir.path()).await));

        let (status, body) = fetch(app, "/auth?error=access_denied").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("access_denied"));
    }

    #[tokio::test]
    async fn missing_code_renders_a_static_page() {
        let server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let app = router().layer(Extension(awaiting_state(&server.url(), dir.path()).await));

        let (status, body) = fetch(app, "/auth").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("authorization redirect"));
    }

    #[tokio::test]
    async fn code_completes_the_registration() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let _token = server
            .mock("POST", "/access_token")
            .with_status(200)
            .with_body(r#"{"access_token":"tok"}"#)
            .create_async()
            .await;
        let _room = server
            .mock("POST", "/rooms")
            .with_status(200)
            .with_body(r#"{"id":"room-1","title":"chatrelay"}"#)
            .create_async()
            .await;
        let _webhook = server
            .mock("POST", "/webhooks")
            .with_status(200)
            .with_body(
                r#"{"id":"w1","name":"n","resource":"messages","event":"created","targetUrl":"https://relay.example.com/webhook"}"#,
            )
            .create_async()
            .await;
        let state = awaiting_state(&server.url(), dir.path()).await;
        let app = router().layer(Extension(state.clone()));

        let (status, body) = fetch(app, "/auth?code=abc").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Setup complete"));
        assert!(state.registration.is_configured().await);
    }

    #[tokio::test]
    async fn failed_exchange_renders_bad_gateway() {
        let mut server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let _token = server
            .mock("POST", "/access_token")
            .with_status(400)
            .with_body("invalid_grant")
            .create_async()
            .await;
        let state = awaiting_state(&server.url(), dir.path()).await;
        let app = router().layer(Extension(state.clone()));

        let (status, body) = fetch(app, "/auth?code=abc").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.contains("exchange failed"));
        assert!(!state.registration.is_configured().await);
    }

    #[test]
    fn html_escaping_neutralizes_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x") & more</script>"#),
            r#"&lt;script&gt;alert("x") &amp; more&lt;/script&gt;"#
        );
    }
}
