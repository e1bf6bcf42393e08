//! HTTP client for the team-messaging platform.
//!
//! Covers the surfaces the relay needs: message retrieval and dispatch, room
//! bootstrap, webhook subscriptions, and the one-time OAuth authorization-code
//! exchange.

mod client;
mod error;
mod oauth;
mod types;

pub use client::PlatformClient;
pub use error::{PlatformError, Result};
pub use oauth::OAuthExchange;
pub use types::{Message, Room, TokenGrant, Webhook, WebhookRegistration};
