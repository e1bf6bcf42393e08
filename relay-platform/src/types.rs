use serde::{Deserialize, Serialize};

/// A message document as the platform returns it. Only the fields the relay
/// reads are modeled; everything else is ignored on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "roomId")]
    pub room_id: Option<String>,
    #[serde(default, rename = "personEmail")]
    pub person_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// A webhook subscription as echoed back by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub event: String,
    #[serde(default, rename = "targetUrl")]
    pub target_url: String,
    #[serde(default)]
    pub filter: Option<String>,
}

/// Parameters for a webhook subscription create call.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookRegistration {
    pub name: String,
    #[serde(rename = "targetUrl")]
    pub target_url: String,
    pub resource: String,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl WebhookRegistration {
    /// Subscription for newly created messages, the only resource/event pair
    /// the relay consumes.
    pub fn messages_created(name: &str, target_url: &str) -> Self {
        Self {
            name: name.to_string(),
            target_url: target_url.to_string(),
            resource: "messages".to_string(),
            event: "created".to_string(),
            filter: None,
        }
    }
}

/// Token grant returned by the authorization-code exchange.
///
/// `access_token` is kept as the platform sent it, empty string included;
/// deciding whether an empty token is fatal is the caller's policy.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}
