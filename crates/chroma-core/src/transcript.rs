//! Append-only conversation transcript.
//!
//! Messages are never edited or reordered after insertion; the only bulk
//! operation is `clear`, used when a call ends or a new upload begins.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One utterance in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub id: String,
    pub role: Role,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl TranscriptMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }
}

/// Ordered, append-only sequence of transcript messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<TranscriptMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Insertion order is the only order.
    pub fn push(&mut self, message: TranscriptMessage) {
        self.messages.push(message);
    }

    /// Read-only view of the messages, oldest first.
    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message. Used on call end and on a new upload.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_preserves_insertion_order() {
        let mut transcript = Transcript::new();
        transcript.push(TranscriptMessage::assistant("hello"));
        transcript.push(TranscriptMessage::user("hi"));
        transcript.push(TranscriptMessage::assistant("how can I help?"));

        let texts: Vec<&str> = transcript
            .messages()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts, vec!["hello", "hi", "how can I help?"]);
        assert_eq!(transcript.messages()[0].role, Role::Assistant);
        assert_eq!(transcript.messages()[1].role, Role::User);
    }

    #[test]
    fn ids_are_unique() {
        let a = TranscriptMessage::assistant("a");
        let b = TranscriptMessage::assistant("a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn clear_empties_the_transcript() {
        let mut transcript = Transcript::new();
        transcript.push(TranscriptMessage::user("anything"));
        assert!(!transcript.is_empty());
        transcript.clear();
        assert!(transcript.is_empty());
        assert_eq!(transcript.len(), 0);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
