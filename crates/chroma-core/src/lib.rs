//! # Chroma Core — shared types and configuration
//!
//! Foundation crate for the Chroma voice fashion assistant: the append-only
//! conversation transcript, and layered configuration (defaults → optional
//! file → `CHROMA_*` environment) with fail-fast secret accessors.

pub mod config;
pub mod error;
pub mod transcript;

pub use config::{vision_api_key, voice_assistant_id, voice_public_key, CoreConfig};
pub use error::{CoreError, CoreResult};
pub use transcript::{Role, Transcript, TranscriptMessage};
