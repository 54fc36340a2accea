// Gateway module for providers - follows the Train Station Pattern
// All external access must go through this gateway

mod openai;
mod traits;

use thiserror::Error;

pub use openai::OpenAiProvider;
#[cfg(test)]
pub use traits::MockProvider;
pub use traits::Provider;

/// Failures of a single provider call
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("provider returned no choices")]
    EmptyResponse,

    #[error("{0}")]
    Other(String),
}
