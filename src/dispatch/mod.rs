// Gateway module for prompt dispatch - follows the Train Station Pattern
// All external access must go through this gateway

mod dispatcher;
mod worker;

use std::time::Duration;
use thiserror::Error;

use crate::provider::ProviderError;
use crate::session::ConversationId;

pub use dispatcher::{Answer, Dispatcher, DispatcherConfig, PendingAnswer, Prompt, QueueFullPolicy};
pub use worker::{Worker, WorkerError, WorkerLease, WorkerPool};

/// Terminal failures of a submitted prompt
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("prompt queue is full (max: {capacity})")]
    QueueFull { capacity: usize },

    #[error("no worker available")]
    WorkerUnavailable,

    #[error("worker {0} is busy")]
    WorkerBusy(usize),

    #[error("no answer for conversation {conversation_id} within {after:?}")]
    Timeout {
        conversation_id: ConversationId,
        after: Duration,
    },

    #[error("provider failed for conversation {conversation_id} on prompt {prompt_preview:?}: {source}")]
    Provider {
        conversation_id: ConversationId,
        prompt_preview: String,
        #[source]
        source: ProviderError,
    },

    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),

    #[error("dispatcher already started")]
    AlreadyStarted,

    #[error("dispatcher is shutting down")]
    ShuttingDown,

    #[error("prompt task ended without an outcome")]
    Aborted,
}
