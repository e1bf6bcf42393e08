use crate::error::{PlatformError, Result};
use crate::types::{Message, Room, Webhook, WebhookRegistration};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.ciscospark.com/v1";

#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl PlatformClient {
    pub fn new(access_token: &str) -> Result<Self> {
        let token = access_token.trim();
        if token.is_empty() {
            return Err(PlatformError::InvalidInput(
                "platform access token is required".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            access_token: token.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Fetch the full message document behind a webhook notification. Events
    /// only carry the message id; the text lives here.
    #[tracing::instrument(level = "debug", skip_all, fields(message_id = %message_id))]
    pub async fn get_message(&self, message_id: &str) -> Result<Message> {
        let url = format!("{}/messages/{message_id}", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

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

    #[tracing::instrument(level = "debug", skip_all, fields(room_id = %room_id))]
    pub async fn send_message(&self, room_id: &str, text: &str) -> Result<Message> {
        if text.trim().is_empty() {
            return Err(PlatformError::InvalidInput(
                "message text is empty".to_string(),
            ));
        }
        let payload = serde_json::json!({
            "roomId": room_id,
            "text": text,
        });
        let url = format!("{}/messages", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

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

    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn create_room(&self, title: &str) -> Result<Room> {
        let payload = serde_json::json!({ "title": title });
        let url = format!("{}/rooms", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

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

    #[tracing::instrument(level = "debug", skip_all, fields(target_url = %registration.target_url))]
    pub async fn create_webhook(&self, registration: &WebhookRegistration) -> Result<Webhook> {
        let url = format!("{}/webhooks", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(registration)
            .send()
            .await?;

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

    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn list_webhooks(&self) -> Result<Vec<Webhook>> {
        let url = format!("{}/webhooks", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PlatformError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let list: WebhookList = serde_json::from_str(&body)?;
        Ok(list.items)
    }
}

#[derive(Debug, Default, Deserialize)]
struct WebhookList {
    #[serde(default)]
    items: Vec<Webhook>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::Server) -> PlatformClient {
        PlatformClient::new("test-token")
            .expect("client builds")
            .with_api_base(&server.url())
    }

    #[test]
    fn empty_token_is_rejected() {
        let err = PlatformClient::new("  ").expect_err("client must not build");
        assert!(matches!(err, PlatformError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn get_message_parses_document() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/messages/m1")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "id": "m1",
                    "roomId": "r1",
                    "personEmail": "someone@example.com",
                    "text": "hello bot"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let message = client(&server)
            .get_message("m1")
            .await
            .expect("get_message succeeds");
        assert_eq!(message.id, "m1");
        assert_eq!(message.room_id.as_deref(), Some("r1"));
        assert_eq!(message.text.as_deref(), Some("hello bot"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_message_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/messages/m404")
            .with_status(404)
            .with_body("message not found")
            .create_async()
            .await;

        let err = client(&server)
            .get_message("m404")
            .await
            .expect_err("get_message fails");
        match err {
            PlatformError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "message not found");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_message_posts_room_and_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/messages")
            .match_body(Matcher::Json(serde_json::json!({
                "roomId": "r1",
                "text": "Hello"
            })))
            .with_status(200)
            .with_body(r#"{"id":"m2","roomId":"r1","text":"Hello"}"#)
            .create_async()
            .await;

        let sent = client(&server)
            .send_message("r1", "Hello")
            .await
            .expect("send_message succeeds");
        assert_eq!(sent.id, "m2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn send_message_rejects_blank_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/messages").expect(0).create_async().await;

        let err = client(&server)
            .send_message("r1", "  ")
            .await
            .expect_err("send_message fails");
        assert!(matches!(err, PlatformError::InvalidInput(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_webhook_sends_registration_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/webhooks")
            .match_body(Matcher::Json(serde_json::json!({
                "name": "relay",
                "targetUrl": "https://relay.example.com/webhook",
                "resource": "messages",
                "event": "created"
            })))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "id": "w1",
                    "name": "relay",
                    "resource": "messages",
                    "event": "created",
                    "targetUrl": "https://relay.example.com/webhook"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let registration =
            WebhookRegistration::messages_created("relay", "https://relay.example.com/webhook");
        let webhook = client(&server)
            .create_webhook(&registration)
            .await
            .expect("create_webhook succeeds");
        assert_eq!(webhook.id, "w1");
        assert_eq!(webhook.target_url, "https://relay.example.com/webhook");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn list_webhooks_unwraps_items() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/webhooks")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "items": [
                        { "id": "w1", "name": "a", "resource": "messages", "event": "created", "targetUrl": "https://x/webhook" },
                        { "id": "w2", "name": "b", "resource": "messages", "event": "created", "targetUrl": "https://y/webhook" }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let webhooks = client(&server)
            .list_webhooks()
            .await
            .expect("list_webhooks succeeds");
        assert_eq!(webhooks.len(), 2);
        assert_eq!(webhooks[1].id, "w2");
    }
}
