// Gateway module for the inbound side - follows the Train Station Pattern
// All external access must go through this gateway

mod inbound;
mod messages;
mod service;

pub use inbound::{write_replies, Inbound, LineInbound};
pub use messages::{ErrorKind, InboundMessage, InboundRequest, OutboundReply, ReplyBody};
pub use service::Gateway;
