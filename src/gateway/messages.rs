use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchError;
use crate::session::{ConversationId, SessionError};
use crate::utils::GatewayError;

/// A raw inbound request, decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundRequest {
    /// Echoed back on the reply for correlation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub message: InboundMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Open a conversation
    NewChat {
        #[serde(default)]
        from_user: Option<String>,
        #[serde(default)]
        history_capacity: Option<usize>,
    },
    /// Ask something within a conversation
    ChatMessage {
        conversation_id: ConversationId,
        prompt: String,
    },
    /// Close a conversation
    EndChat { conversation_id: ConversationId },
    /// Fetch the retained answers of a conversation
    History { conversation_id: ConversationId },
}

impl InboundRequest {
    pub fn decode(raw: &[u8]) -> Result<Self, GatewayError> {
        serde_json::from_slice(raw).map_err(|e| GatewayError::BadRequest(e.to_string()))
    }
}

/// Reply to exactly one inbound request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub body: ReplyBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyBody {
    Created {
        conversation_id: ConversationId,
    },
    Answer {
        conversation_id: ConversationId,
        answer: String,
        /// Set when the answer could not be published to the bus
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bus_error: Option<String>,
    },
    Ended {
        conversation_id: ConversationId,
    },
    History {
        conversation_id: ConversationId,
        answers: Vec<String>,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

/// Machine-readable failure class carried on error replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    CapacityExceeded,
    NotFound,
    QueueFull,
    WorkerUnavailable,
    Timeout,
    ProviderError,
    TransportError,
    ShuttingDown,
    Internal,
}

impl From<&GatewayError> for ErrorKind {
    fn from(err: &GatewayError) -> Self {
        match err {
            GatewayError::BadRequest(_) => Self::BadRequest,
            GatewayError::Session(SessionError::CapacityExceeded { .. }) => Self::CapacityExceeded,
            GatewayError::Session(SessionError::NotFound(_) | SessionError::NoConversations) => {
                Self::NotFound
            }
            GatewayError::Dispatch(err) => match err {
                DispatchError::QueueFull { .. } => Self::QueueFull,
                DispatchError::WorkerUnavailable | DispatchError::WorkerBusy(_) => {
                    Self::WorkerUnavailable
                }
                DispatchError::Timeout { .. } => Self::Timeout,
                DispatchError::Provider { .. } => Self::ProviderError,
                DispatchError::ConversationNotFound(_) => Self::NotFound,
                DispatchError::ShuttingDown => Self::ShuttingDown,
                DispatchError::AlreadyStarted | DispatchError::Aborted => Self::Internal,
            },
            GatewayError::Provider(_) => Self::ProviderError,
            GatewayError::Transport(_) => Self::TransportError,
            _ => Self::Internal,
        }
    }
}

impl OutboundReply {
    pub fn new(request_id: Option<String>, body: ReplyBody) -> Self {
        Self { request_id, body }
    }

    pub fn error(request_id: Option<String>, err: &GatewayError) -> Self {
        Self::new(
            request_id,
            ReplyBody::Error {
                kind: ErrorKind::from(err),
                message: err.to_string(),
            },
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, ReplyBody::Error { .. })
    }

    pub fn to_json(&self) -> String {
        // Every field is plain data; serialization cannot fail
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","kind":"internal","message":"{e}"}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_decode_chat_message() {
        let id = ConversationId::new();
        let raw = format!(
            r#"{{"type":"chat_message","request_id":"r-1","conversation_id":"{id}","prompt":"hi"}}"#
        );
        let request = InboundRequest::decode(raw.as_bytes()).unwrap();
        assert_eq!(request.request_id.as_deref(), Some("r-1"));
        assert_eq!(
            request.message,
            InboundMessage::ChatMessage {
                conversation_id: id,
                prompt: "hi".to_string()
            }
        );
    }

    #[test]
    fn test_decode_new_chat_defaults() {
        let request = InboundRequest::decode(br#"{"type":"new_chat"}"#).unwrap();
        assert_eq!(request.request_id, None);
        assert_eq!(
            request.message,
            InboundMessage::NewChat {
                from_user: None,
                history_capacity: None
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_type_and_bad_id() {
        assert!(matches!(
            InboundRequest::decode(br#"{"type":"dance"}"#),
            Err(GatewayError::BadRequest(_))
        ));
        assert!(matches!(
            InboundRequest::decode(br#"{"type":"end_chat","conversation_id":"nope"}"#),
            Err(GatewayError::BadRequest(_))
        ));
        assert!(InboundRequest::decode(b"not json").is_err());
    }

    #[test]
    fn test_reply_wire_format() {
        let id = ConversationId::new();
        let reply = OutboundReply::new(
            Some("r-9".to_string()),
            ReplyBody::Answer {
                conversation_id: id,
                answer: "42".to_string(),
                bus_error: None,
            },
        );
        let value: serde_json::Value = serde_json::from_str(&reply.to_json()).unwrap();
        assert_eq!(value["type"], "answer");
        assert_eq!(value["request_id"], "r-9");
        assert_eq!(value["conversation_id"], id.to_string());
        assert!(value.get("bus_error").is_none());
    }

    #[test]
    fn test_error_kinds() {
        let timeout = GatewayError::Dispatch(DispatchError::Timeout {
            conversation_id: ConversationId::new(),
            after: Duration::from_secs(1),
        });
        assert_eq!(ErrorKind::from(&timeout), ErrorKind::Timeout);

        let full = GatewayError::Session(SessionError::CapacityExceeded { capacity: 1 });
        let reply = OutboundReply::error(None, &full);
        assert!(reply.is_error());
        assert!(matches!(
            reply.body,
            ReplyBody::Error { kind: ErrorKind::CapacityExceeded, .. }
        ));

        let busy = GatewayError::Dispatch(DispatchError::WorkerUnavailable);
        assert_eq!(ErrorKind::from(&busy), ErrorKind::WorkerUnavailable);
    }
}
