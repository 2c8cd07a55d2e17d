//! # Chroma Session — voice session coordination
//!
//! Owns the lifecycle of one voice conversation with the external speech
//! assistant: start, mute, end, bounded reconnection, and the append-only
//! transcript.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Session                           │
//! │  ┌─────────────┐   events    ┌─────────────────────┐    │
//! │  │ VoiceClient │ ──────────▶ │ SessionCoordinator  │    │
//! │  │ (wire / ws) │ ◀────────── │ (pure state machine)│    │
//! │  └─────────────┘  directives └─────────────────────┘    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The coordinator is pure state; the [`driver::Session`] performs every side
//! effect (client calls, reconnect timers) and serializes all transitions.

pub mod client;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod wire;

pub use client::{
    EventBus, EventSubscription, FirstMessageMode, SessionConfig, VoiceClient, VoiceEvent,
};
pub use coordinator::{
    Directive, Phase, RetryState, SessionCoordinator, StateSnapshot, ANALYSIS_READY_NOTICE,
    CONNECTION_APOLOGY, GREETING, MAX_RECONNECT_ATTEMPTS,
};
pub use driver::Session;
pub use error::{SessionError, SessionResult};
pub use wire::WireVoiceClient;
