//! Error types for the voice session system

use thiserror::Error;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while coordinating a voice session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session already connected")]
    AlreadyConnected,

    #[error("Session not ready: {0}")]
    NotReady(String),

    #[error("No active call")]
    NoActiveCall,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Voice client error: {0}")]
    Client(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),
}

impl From<chroma_core::CoreError> for SessionError {
    fn from(err: chroma_core::CoreError) -> Self {
        SessionError::Config(err.to_string())
    }
}
