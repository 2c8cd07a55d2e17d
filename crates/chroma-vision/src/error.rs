//! Error types for image intake and the vision analysis client

use thiserror::Error;

/// Result type alias for vision operations
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors that can occur during image intake or a vision model call
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vision request failed: {0}")]
    Request(String),

    #[error("Vision provider error {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Vision response parse failed: {0}")]
    Parse(String),

    #[error("Vision response contained no text")]
    EmptyResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<chroma_core::CoreError> for VisionError {
    fn from(err: chroma_core::CoreError) -> Self {
        VisionError::Config(err.to_string())
    }
}
