//! Conversation-scoped NLU session ids.
//!
//! Ids are minted lazily on first sight of a conversation and live for the
//! process lifetime; there is no expiry. A restart starts from an empty map
//! and the engine simply opens fresh dialogue contexts.

use dashmap::DashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Session id for a conversation, minting one if absent. The entry API
    /// serializes concurrent first deliveries for the same conversation, so
    /// all of them observe the same id.
    pub fn get_or_create(&self, conversation_id: &str) -> String {
        self.sessions
            .entry(conversation_id.to_string())
            .or_insert_with(|| Uuid::new_v4().to_string())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
