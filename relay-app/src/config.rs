//! Environment-driven application configuration.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_HTTP_MAX_IN_FLIGHT: usize = 256;

/// How the platform access token is acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformAuth {
    /// Static token from the environment; configure at startup.
    Token(String),
    /// OAuth client credentials; the token arrives later through the
    /// authorization redirect endpoint.
    OAuth {
        client_id: String,
        client_secret: String,
    },
}

impl PlatformAuth {
    pub fn mode_label(&self) -> &'static str {
        match self {
            Self::Token(_) => "static_token",
            Self::OAuth { .. } => "oauth",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Public base URL the platform can reach, without a trailing slash.
    pub public_base_url: String,
    pub nlu_access_token: String,
    pub nlu_language: String,
    pub nlu_api_base: Option<String>,
    pub platform_auth: PlatformAuth,
    pub platform_api_base: Option<String>,
    pub dev_mode: bool,
    pub data_dir: PathBuf,
    pub http_timeout_seconds: u64,
    pub http_max_in_flight: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an injected lookup so tests never touch process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("PORT") {
            Some(v) => parse_var("PORT", &v)?,
            None => DEFAULT_PORT,
        };

        let public_base_url = match get("RELAY_BASE_URL") {
            Some(v) => v.trim_end_matches('/').to_string(),
            // Heroku-style deployments only know their app name.
            None => match get("APP_NAME") {
                Some(app) => format!("https://{app}.herokuapp.com"),
                None => bail!("RELAY_BASE_URL (or APP_NAME) is required for the public base url"),
            },
        };

        let nlu_access_token =
            get("NLU_ACCESS_TOKEN").ok_or_else(|| anyhow!("NLU_ACCESS_TOKEN is required"))?;
        let nlu_language = get("NLU_LANG").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        let nlu_api_base = get("NLU_API_BASE");

        let platform_auth = match get("PLATFORM_TOKEN") {
            Some(token) => PlatformAuth::Token(token),
            None => match (get("PLATFORM_CLIENT_ID"), get("PLATFORM_CLIENT_SECRET")) {
                (Some(client_id), Some(client_secret)) => PlatformAuth::OAuth {
                    client_id,
                    client_secret,
                },
                _ => bail!(
                    "PLATFORM_TOKEN or PLATFORM_CLIENT_ID/PLATFORM_CLIENT_SECRET is required"
                ),
            },
        };
        let platform_api_base = get("PLATFORM_API_BASE");

        let dev_mode = get("DEVELOPMENT_CONFIG")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let data_dir = match get("RELAY_DATA_DIR") {
            Some(v) => PathBuf::from(v),
            None => {
                let home = get("HOME")
                    .ok_or_else(|| anyhow!("HOME is not set; set RELAY_DATA_DIR explicitly"))?;
                PathBuf::from(home).join(".chatrelay").join("data")
            }
        };

        let http_timeout_seconds = match get("RELAY_HTTP_TIMEOUT_SECONDS") {
            Some(v) => parse_var("RELAY_HTTP_TIMEOUT_SECONDS", &v)?,
            None => DEFAULT_HTTP_TIMEOUT_SECONDS,
        };
        let http_max_in_flight = match get("RELAY_HTTP_MAX_IN_FLIGHT") {
            Some(v) => parse_var("RELAY_HTTP_MAX_IN_FLIGHT", &v)?,
            None => DEFAULT_HTTP_MAX_IN_FLIGHT,
        };

        Ok(Self {
            port,
            public_base_url,
            nlu_access_token,
            nlu_language,
            nlu_api_base,
            platform_auth,
            platform_api_base,
            dev_mode,
            data_dir,
            http_timeout_seconds,
            http_max_in_flight,
        })
    }

    pub fn webhook_url(&self) -> String {
        format!("{}/webhook", self.public_base_url)
    }

    pub fn auth_redirect_url(&self) -> String {
        format!("{}/auth", self.public_base_url)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| anyhow!("invalid {name}={value:?}: {e}"))
}

/// The assembled bot credentials. Persisted once registration completes and
/// restored on later startups so the webhook is never re-registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    pub nlu_access_token: String,
    pub nlu_language: String,
    pub platform_token: String,
    #[serde(default)]
    pub dev_mode: bool,
}
