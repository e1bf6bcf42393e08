//! Event relay: webhook notification in, NLU-fulfilled reply out.

use crate::session::SessionStore;
use relay_nlu::{NluClient, NluReply};
use relay_platform::PlatformClient;
use serde::Deserialize;

/// Inbound webhook event envelope. Only the fields the relay routes on are
/// modeled; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: EventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub id: Option<String>,
}

/// Terminal disposition of one webhook delivery. Exactly one per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Fulfillment text accepted; dispatch into the room has been started.
    ReplySent,
    /// The engine answered without usable fulfillment text.
    EmptySpeech,
    /// The interpret call failed.
    NluFailure,
    /// The event is not a created-message notification.
    Ignored(IgnoreReason),
    /// An actionable event was abandoned before interpretation.
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotMessagesResource,
    MissingMessageId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    FetchFailed,
    EmptyText,
    MissingRoom,
}

pub struct Relay {
    nlu: NluClient,
    platform: PlatformClient,
    sessions: SessionStore,
}

impl Relay {
    pub fn new(nlu: NluClient, platform: PlatformClient) -> Self {
        Self {
            nlu,
            platform,
            sessions: SessionStore::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Drive one webhook delivery to its terminal outcome. Never retries;
    /// every return is final for this event.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn process_event(&self, event: InboundEvent) -> RelayOutcome {
        if event.resource.as_deref() != Some("messages") {
            tracing::debug!(
                resource = ?event.resource,
                event = ?event.event,
                "ignoring event for unrelated resource"
            );
            return RelayOutcome::Ignored(IgnoreReason::NotMessagesResource);
        }
        let Some(message_id) = event.data.id.as_deref().filter(|id| !id.is_empty()) else {
            tracing::warn!("message event carried no message id; ignoring it");
            return RelayOutcome::Ignored(IgnoreReason::MissingMessageId);
        };

        let message = match self.platform.get_message(message_id).await {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(message_id = %message_id, error = %e, "message retrieval failed; dropping event");
                return RelayOutcome::Dropped(DropReason::FetchFailed);
            }
        };

        let text = message.text.as_deref().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            tracing::warn!(message_id = %message_id, "message has no text; dropping event");
            return RelayOutcome::Dropped(DropReason::EmptyText);
        }
        let Some(room_id) = message.room_id.as_deref().filter(|r| !r.is_empty()) else {
            tracing::warn!(message_id = %message_id, "message has no room id; dropping event");
            return RelayOutcome::Dropped(DropReason::MissingRoom);
        };

        let session_id = self.sessions.get_or_create(room_id);
        tracing::debug!(
            room_id = %room_id,
            session_id = %session_id,
            person = ?message.person_email,
            lang = %self.nlu.language(),
            "relaying message to nlu"
        );

        match self.nlu.interpret(text, &session_id).await {
            Ok(NluReply::Speech(speech)) => {
                self.dispatch_reply(room_id, speech);
                RelayOutcome::ReplySent
            }
            Ok(NluReply::Empty) => {
                tracing::info!(room_id = %room_id, "nlu returned no fulfillment text");
                RelayOutcome::EmptySpeech
            }
            Err(e) => {
                tracing::error!(room_id = %room_id, error = %e, "nlu interpret failed");
                RelayOutcome::NluFailure
            }
        }
    }

    /// Fire-and-forget: the webhook acknowledgment never waits for the
    /// platform send, and a failed send only logs.
    fn dispatch_reply(&self, room_id: &str, text: String) {
        let platform = self.platform.clone();
        let room_id = room_id.to_string();
        tokio::spawn(async move {
            match platform.send_message(&room_id, &text).await {
                Ok(sent) => {
                    tracing::debug!(room_id = %room_id, message_id = %sent.id, "reply dispatched")
                }
                Err(e) => {
                    tracing::error!(room_id = %room_id, error = %e, "reply dispatch failed")
                }
            }
        });
    }
}
