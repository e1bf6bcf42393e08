use crate::error::{PlatformError, Result};
use crate::types::TokenGrant;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.ciscospark.com/v1";

/// One-time authorization-code exchange against the platform token endpoint.
///
/// Built once registration starts waiting for the redirect; `exchange_code`
/// runs when the installer's browser lands on the redirect URL with a code.
#[derive(Debug, Clone)]
pub struct OAuthExchange {
    http: reqwest::Client,
    api_base: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl OAuthExchange {
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str) -> Result<Self> {
        let client_id = client_id.trim();
        let client_secret = client_secret.trim();
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(PlatformError::InvalidInput(
                "oauth client id and secret are required".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let url = format!("{}/access_token", self.api_base);
        let response = self.http.post(&url).form(&form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PlatformError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn exchange(server: &mockito::Server) -> OAuthExchange {
        OAuthExchange::new("cid", "secret", "https://relay.example.com/auth")
            .expect("exchange builds")
            .with_api_base(&server.url())
    }

    #[test]
    fn blank_credentials_are_rejected() {
        let err = OAuthExchange::new(" ", "secret", "https://x/auth")
            .expect_err("exchange must not build");
        assert!(matches!(err, PlatformError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn exchange_posts_authorization_code_grant() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/access_token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("client_id".into(), "cid".into()),
                Matcher::UrlEncoded("client_secret".into(), "secret".into()),
                Matcher::UrlEncoded("code".into(), "abc".into()),
                Matcher::UrlEncoded(
                    "redirect_uri".into(),
                    "https://relay.example.com/auth".into(),
                ),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"tok","expires_in":1209600}"#)
            .create_async()
            .await;

        let grant = exchange(&server)
            .exchange_code("abc")
            .await
            .expect("exchange succeeds");
        assert_eq!(grant.access_token, "tok");
        assert_eq!(grant.expires_in, Some(1209600));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_access_token_parses_as_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/access_token")
            .with_status(200)
            .with_body(r#"{"expires_in":600}"#)
            .create_async()
            .await;

        let grant = exchange(&server)
            .exchange_code("abc")
            .await
            .expect("exchange succeeds");
        assert!(grant.access_token.is_empty());
    }

    #[tokio::test]
    async fn failed_exchange_surfaces_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/access_token")
            .with_status(400)
            .with_body("invalid_grant")
            .create_async()
            .await;

        let err = exchange(&server)
            .exchange_code("abc")
            .await
            .expect_err("exchange fails");
        match err {
            PlatformError::Status { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "invalid_grant");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
