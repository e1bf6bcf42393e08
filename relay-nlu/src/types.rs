/// Outcome of a single-turn interpretation.
///
/// `Empty` covers every shape of "the engine had nothing to say": an absent
/// result object, an absent fulfillment, or fulfillment text that is empty or
/// whitespace. Callers do not need to distinguish them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NluReply {
    /// Fulfillment text to relay back into the conversation.
    Speech(String),
    /// The engine answered without usable fulfillment text.
    Empty,
}

impl NluReply {
    pub fn from_speech(speech: String) -> Self {
        if speech.trim().is_empty() {
            Self::Empty
        } else {
            Self::Speech(speech)
        }
    }
}
