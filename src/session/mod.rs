/// Session management module - Gateway

mod conversation;
mod registry;

pub use conversation::{Conversation, ConversationId};
pub use registry::{SessionError, SessionRegistry};
