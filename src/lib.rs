pub mod app;
pub mod cli;
pub mod collections;
pub mod constants;
pub mod dispatch;
pub mod gateway;
pub mod provider;
pub mod runtime;
pub mod session;
pub mod transport;
pub mod utils;

pub use app::{load_config, Config};
pub use collections::OrderedQueue;
pub use dispatch::{Dispatcher, Prompt, WorkerPool};
pub use gateway::Gateway;
pub use session::{Conversation, ConversationId, SessionRegistry};
pub use utils::GatewayError;
