// Gateway module for the outbound bus - follows the Train Station Pattern
// All external access must go through this gateway

mod events;
mod memory;
mod nats;
mod traits;

use std::time::Duration;
use thiserror::Error;

pub use events::BusEvent;
pub use memory::InMemoryBus;
pub use nats::NatsTransport;
#[cfg(test)]
pub use traits::MockTransport;
pub use traits::{Topic, Transport};

/// Failures while publishing to the outbound bus
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("topic {0} not found")]
    TopicNotFound(Topic),

    #[error("could not dial bus at {url}: {reason}")]
    Dial { url: String, reason: String },

    #[error("could not write to {topic}: {reason}")]
    Write { topic: Topic, reason: String },

    #[error("write to {topic} timed out after {after:?}")]
    WriteTimeout { topic: Topic, after: Duration },

    #[error("could not close bus connection: {0}")]
    Close(String),

    #[error("could not encode bus event: {0}")]
    Encode(String),
}
