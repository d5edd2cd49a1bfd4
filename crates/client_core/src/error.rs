use shared::error::TransportError;
use thiserror::Error;

/// Local rejections. None of these ever reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("no model is loaded for this conversation")]
    ModelNotLoaded,
    #[error("a model load or unload is already in progress")]
    ToggleInFlight,
    #[error("no conversation is open")]
    NoActiveConversation,
    #[error("no model selected")]
    NoModelSelected,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ClientError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}
