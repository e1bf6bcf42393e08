use crate::error::{NluError, Result};
use crate::types::NluReply;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.api.ai/v1";
const PROTOCOL_VERSION: &str = "20150910";

#[derive(Clone)]
pub struct NluClient {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
    language: String,
}

impl NluClient {
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(access_token: &str, language: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            access_token: access_token.to_string(),
            language: language.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Single-turn query. The session id is what keeps dialogue context alive
    /// across otherwise independent calls.
    #[tracing::instrument(level = "info", skip_all, fields(session_id = %session_id))]
    pub async fn interpret(&self, text: &str, session_id: &str) -> Result<NluReply> {
        if text.trim().is_empty() {
            return Err(NluError::InvalidInput("query text is empty".to_string()));
        }

        let req = QueryRequest {
            query: text,
            lang: &self.language,
            session_id,
        };

        let url = format!("{}/query?v={PROTOCOL_VERSION}", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(NluError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: QueryResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_reply())
    }
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    lang: &'a str,
    #[serde(rename = "sessionId")]
    session_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Option<QueryResult>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResult {
    #[serde(default)]
    fulfillment: Option<Fulfillment>,
}

#[derive(Debug, Default, Deserialize)]
struct Fulfillment {
    #[serde(default)]
    speech: String,
}

impl QueryResponse {
    fn into_reply(self) -> NluReply {
        let speech = self
            .result
            .and_then(|r| r.fulfillment)
            .map(|f| f.speech)
            .unwrap_or_default();
        NluReply::from_speech(speech)
    }
}
