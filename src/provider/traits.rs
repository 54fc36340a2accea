use async_trait::async_trait;

use super::ProviderError;

/// Stateless language-model client.
///
/// The credential is passed per call so that each worker can carry its own key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send a single prompt and return the answer text
    async fn prompt(&self, credential: &str, text: &str) -> Result<String, ProviderError>;

    /// Startup health check. An explicit "bad request" still proves the
    /// endpoint is reachable and the key is well formed.
    async fn ping(&self, credential: &str) -> Result<(), ProviderError>;

    /// Name used in logs
    fn name(&self) -> &str;
}
