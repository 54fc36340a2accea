/// Constants module to avoid magic numbers in the codebase

// Dispatcher
pub const DEFAULT_WORKERS: usize = 30;
pub const DEFAULT_QUEUE_BUFFER: usize = 125;
pub const DEFAULT_PROMPT_TIMEOUT_MS: u64 = 30_000;

// Sessions
pub const DEFAULT_CONVERSATION_CAPACITY: usize = 24;
pub const DEFAULT_HISTORY_CAPACITY: usize = 1024;

// Inbound
pub const DEFAULT_MESSAGE_QUEUE_CAPACITY: usize = 24;

// Bus
pub const TOPIC_PROMPT: &str = "bot-prompt-message";
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";
pub const DEFAULT_BUS_WRITE_TIMEOUT_MS: u64 = 10_000;
pub const IN_MEMORY_TOPIC_BUFFER: usize = 100;

// Provider
pub const DEFAULT_PROVIDER_URL: &str = "https://api.openai.com";
pub const DEFAULT_PROVIDER_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const PING_PROMPT: &str = "I'm testing to see if you work:)";

// Logging
pub const PROMPT_PREVIEW_CHARS: usize = 48;
