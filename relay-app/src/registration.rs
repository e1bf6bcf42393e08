//! Registration controller: token acquisition, webhook bootstrap, recovery.
//!
//! The relay core never sees how its platform token was acquired; this module
//! turns environment credentials (static token or OAuth client credentials)
//! plus the optional persisted document into a running `Relay`.

use crate::config::{AppConfig, BotConfig, PlatformAuth};
use crate::config_store::ConfigStore;
use crate::relay::Relay;
use relay_nlu::NluClient;
use relay_platform::{OAuthExchange, PlatformClient, PlatformError, Webhook, WebhookRegistration};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

const WEBHOOK_NAME: &str = "chatrelay messages webhook";
const BOOTSTRAP_ROOM_TITLE: &str = "chatrelay";

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("AccessToken is empty")]
    EmptyAccessToken,

    #[error("authorization code exchange failed: {0}")]
    Exchange(PlatformError),

    #[error("platform client setup failed: {0}")]
    Client(PlatformError),

    #[error("conversation bootstrap failed: {0}")]
    Conversation(PlatformError),

    #[error("webhook subscription failed: {0}")]
    Subscription(PlatformError),

    #[error("persisting bot config failed: {0}")]
    Persist(anyhow::Error),

    #[error("no authorization is pending")]
    NotAwaiting,

    #[error("bot is already configured")]
    AlreadyConfigured,
}

enum RegistrationState {
    Unconfigured,
    AwaitingAuthorization(OAuthExchange),
    Configured(Arc<Relay>),
}

pub struct RegistrationController {
    cfg: AppConfig,
    store: ConfigStore,
    state: Mutex<RegistrationState>,
}

impl RegistrationController {
    pub fn new(cfg: AppConfig, store: ConfigStore) -> Self {
        Self {
            cfg,
            store,
            state: Mutex::new(RegistrationState::Unconfigured),
        }
    }

    /// Bring the relay up: restore from disk if possible, otherwise start the
    /// configured acquisition strategy. Registration failures are logged, not
    /// fatal; the process stays up and answers 503 until configured.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn bootstrap(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;

        let restored = match self.store.load().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "persisted bot config unreadable; continuing without it");
                None
            }
        };
        if let Some(bot) = restored {
            match self.build_relay(&bot) {
                Ok(relay) => {
                    *state = RegistrationState::Configured(Arc::new(relay));
                    tracing::info!(
                        path = %self.store.path().display(),
                        "bot config restored; webhook registration skipped"
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "restored bot config unusable; starting fresh registration");
                }
            }
        }

        match self.cfg.platform_auth.clone() {
            PlatformAuth::Token(token) => match self.configure(token).await {
                Ok(relay) => {
                    *state = RegistrationState::Configured(relay);
                    tracing::info!("configured from static platform token");
                }
                Err(e) => {
                    tracing::error!(error = %e, "static token configuration failed; the platform token may be wrong");
                }
            },
            PlatformAuth::OAuth {
                client_id,
                client_secret,
            } => {
                let mut exchange =
                    OAuthExchange::new(&client_id, &client_secret, &self.cfg.auth_redirect_url())
                        .map_err(|e| anyhow::anyhow!("oauth exchange setup failed: {e}"))?;
                if let Some(base) = &self.cfg.platform_api_base {
                    exchange = exchange.with_api_base(base);
                }
                *state = RegistrationState::AwaitingAuthorization(exchange);
                tracing::info!(
                    redirect_url = %self.cfg.auth_redirect_url(),
                    "awaiting oauth authorization; complete the grant to finish setup"
                );
            }
        }
        Ok(())
    }

    /// One-time authorization code handling; drives
    /// `AwaitingAuthorization -> Configured`. Every failure leaves the state
    /// where it was so the installer can retry with a fresh code.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn handle_authorization_code(&self, code: &str) -> Result<(), RegistrationError> {
        let mut state = self.state.lock().await;
        let exchange = match &*state {
            RegistrationState::AwaitingAuthorization(exchange) => exchange.clone(),
            RegistrationState::Configured(_) => return Err(RegistrationError::AlreadyConfigured),
            RegistrationState::Unconfigured => return Err(RegistrationError::NotAwaiting),
        };

        let grant = exchange
            .exchange_code(code)
            .await
            .map_err(RegistrationError::Exchange)?;
        if grant.access_token.trim().is_empty() {
            return Err(RegistrationError::EmptyAccessToken);
        }

        let relay = self.configure(grant.access_token).await?;
        *state = RegistrationState::Configured(relay);
        tracing::info!("configured from oauth authorization code");
        Ok(())
    }

    /// Deliberate webhook re-registration from the persisted configuration,
    /// for when the public base url changed. The platform keeps any previous
    /// subscription; this is a create, not an upsert.
    pub async fn force_register(&self) -> anyhow::Result<()> {
        let bot = self.store.load().await?.ok_or_else(|| {
            anyhow::anyhow!("no persisted bot config; run serve and complete setup first")
        })?;
        let platform = self.platform_client(&bot.platform_token)?;
        match platform.list_webhooks().await {
            Ok(existing) => {
                tracing::info!(existing = existing.len(), "current webhook subscriptions")
            }
            Err(e) => tracing::warn!(error = %e, "webhook listing failed; registering anyway"),
        }
        self.register_webhook(&platform).await?;
        Ok(())
    }

    pub async fn current_relay(&self) -> Option<Arc<Relay>> {
        match &*self.state.lock().await {
            RegistrationState::Configured(relay) => Some(relay.clone()),
            _ => None,
        }
    }

    pub async fn is_configured(&self) -> bool {
        self.current_relay().await.is_some()
    }

    pub async fn status_label(&self) -> &'static str {
        match &*self.state.lock().await {
            RegistrationState::Unconfigured => "unconfigured",
            RegistrationState::AwaitingAuthorization(_) => "awaiting_authorization",
            RegistrationState::Configured(_) => "configured",
        }
    }

    /// Full configuration from a fresh platform token: bootstrap room,
    /// webhook subscription, persistence, relay construction. Does not touch
    /// the state; callers hold the lock.
    async fn configure(&self, platform_token: String) -> Result<Arc<Relay>, RegistrationError> {
        let bot = BotConfig {
            nlu_access_token: self.cfg.nlu_access_token.clone(),
            nlu_language: self.cfg.nlu_language.clone(),
            platform_token,
            dev_mode: self.cfg.dev_mode,
        };

        let platform = self
            .platform_client(&bot.platform_token)
            .map_err(RegistrationError::Client)?;
        self.register_webhook(&platform).await?;

        self.store
            .save(&bot)
            .await
            .map_err(RegistrationError::Persist)?;
        tracing::info!(path = %self.store.path().display(), "bot config persisted");

        let relay = self.build_relay(&bot)?;
        Ok(Arc::new(relay))
    }

    async fn register_webhook(&self, platform: &PlatformClient) -> Result<(), RegistrationError> {
        let room = platform
            .create_room(BOOTSTRAP_ROOM_TITLE)
            .await
            .map_err(RegistrationError::Conversation)?;
        tracing::info!(room_id = %room.id, "bootstrap room ready");

        let registration =
            WebhookRegistration::messages_created(WEBHOOK_NAME, &self.cfg.webhook_url());
        let webhook = platform
            .create_webhook(&registration)
            .await
            .map_err(RegistrationError::Subscription)?;
        warn_on_incomplete_echo(&webhook);
        tracing::info!(
            webhook_id = %webhook.id,
            target_url = %webhook.target_url,
            "webhook subscription created"
        );
        Ok(())
    }

    fn build_relay(&self, bot: &BotConfig) -> Result<Relay, RegistrationError> {
        let mut nlu = NluClient::new(&bot.nlu_access_token, &bot.nlu_language);
        if let Some(base) = &self.cfg.nlu_api_base {
            nlu = nlu.with_api_base(base);
        }
        let platform = self
            .platform_client(&bot.platform_token)
            .map_err(RegistrationError::Client)?;
        Ok(Relay::new(nlu, platform))
    }

    fn platform_client(&self, token: &str) -> Result<PlatformClient, PlatformError> {
        let mut client = PlatformClient::new(token)?;
        if let Some(base) = &self.cfg.platform_api_base {
            client = client.with_api_base(base);
        }
        Ok(client)
    }
}

/// The platform echoes the registration back; gaps usually mean the
/// subscription will not fire. Not fatal, the relay can still serve restores.
fn warn_on_incomplete_echo(webhook: &Webhook) {
    if webhook.id.is_empty() {
        tracing::warn!("created webhook was echoed without an id");
    }
    if webhook.resource != "messages" || webhook.event != "created" {
        tracing::warn!(
            resource = %webhook.resource,
            event = %webhook.event,
            "created webhook echoed an unexpected resource/event pair"
        );
    }
    if webhook.target_url.is_empty() || webhook.name.is_empty() {
        tracing::warn!("created webhook was echoed without a target url or name");
    }
}
