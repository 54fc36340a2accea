use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::provider::ProviderError;
use crate::session::SessionError;
use crate::transport::TransportError;

/// Main error type for chatgate
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed request: {0}")]
    BadRequest(String),
}
