use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TransportError;
use crate::session::ConversationId;

/// Messages published on the outbound bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    /// A conversation was opened
    NewChat {
        conversation_id: ConversationId,
        from_user: String,
        at: DateTime<Utc>,
    },
    /// A prompt was answered
    Answer {
        conversation_id: ConversationId,
        answer: String,
        at: DateTime<Utc>,
    },
}

impl BusEvent {
    pub fn new_chat(conversation_id: ConversationId, from_user: impl Into<String>) -> Self {
        Self::NewChat {
            conversation_id,
            from_user: from_user.into(),
            at: Utc::now(),
        }
    }

    pub fn answer(conversation_id: ConversationId, answer: impl Into<String>) -> Self {
        Self::Answer {
            conversation_id,
            answer: answer.into(),
            at: Utc::now(),
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        match self {
            Self::NewChat { conversation_id, .. } | Self::Answer { conversation_id, .. } => {
                *conversation_id
            }
        }
    }

    pub fn to_payload(&self) -> Result<Bytes, TransportError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| TransportError::Encode(e.to_string()))
    }

    pub fn from_payload(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_event_wire_format() {
        let id = ConversationId::new();
        let event = BusEvent::answer(id, "42");
        let value: serde_json::Value =
            serde_json::from_slice(&event.to_payload().unwrap()).unwrap();

        assert_eq!(value["type"], "answer");
        assert_eq!(value["conversation_id"], id.to_string());
        assert_eq!(value["answer"], "42");
        assert_eq!(BusEvent::from_payload(&event.to_payload().unwrap()).unwrap(), event);
    }

    #[test]
    fn test_new_chat_event_carries_user() {
        let id = ConversationId::new();
        let event = BusEvent::new_chat(id, "exapsy");
        assert_eq!(event.conversation_id(), id);
        let value: serde_json::Value =
            serde_json::from_slice(&event.to_payload().unwrap()).unwrap();
        assert_eq!(value["type"], "new_chat");
        assert_eq!(value["from_user"], "exapsy");
    }
}
