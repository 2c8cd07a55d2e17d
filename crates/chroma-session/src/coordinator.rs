//! Session coordination: one voice session's lifecycle and transcript.
//!
//! The coordinator is a pure state machine. It mutates no external state and
//! performs no I/O; event handling returns a [`Directive`] telling the async
//! driver what side effect to perform (currently: schedule a reconnect). That
//! keeps the reconnect cap and every phase transition directly testable.

use crate::client::VoiceEvent;
use chroma_core::{Transcript, TranscriptMessage};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Hard cap on automatic reconnect attempts after a connection error.
pub const MAX_RECONNECT_ATTEMPTS: u8 = 2;

/// Greeting appended when a call starts.
pub const GREETING: &str = "Hello! I'm your fashion assistant. I've analyzed your outfit \
     and I'm ready to help. What would you like to know about your outfit?";

/// Apology appended when the voice connection reports an error.
pub const CONNECTION_APOLOGY: &str =
    "I'm sorry, there was a problem with our connection. Please try again.";

/// Notice seeded into the transcript when analysis completes.
pub const ANALYSIS_READY_NOTICE: &str =
    "I've analyzed your outfit! Starting your fashion assistant...";

/// Lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No image analyzed yet.
    Idle,
    /// Analysis request in flight, tagged so stale responses can be dropped.
    Analyzing { generation: u64 },
    /// Analysis text available, session not yet started.
    Ready,
    /// Voice session active.
    Connected,
}

/// Automatic-reconnect state. `GaveUp` is terminal until the user uploads a
/// new image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    Retrying { attempt: u8 },
    GaveUp,
}

/// Side effect requested by `handle_event`, performed by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Restart the session after the fixed delay; `attempt` is 1-based.
    Reconnect { attempt: u8 },
}

/// Read-only snapshot of the session state, for the HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub phase: &'static str,
    pub connected: bool,
    pub muted: bool,
    pub speaking: bool,
    pub reconnect_attempts: u8,
    pub gave_up: bool,
}

/// Owns one session's state: phase, analysis seed, transcript, and flags.
pub struct SessionCoordinator {
    phase: Phase,
    analysis: Option<String>,
    transcript: Transcript,
    muted: bool,
    speaking: bool,
    retry: RetryState,
    /// Latest analysis generation handed out by `begin_analysis`.
    generation: u64,
}

impl Default for SessionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCoordinator {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            analysis: None,
            transcript: Transcript::new(),
            muted: false,
            speaking: false,
            retry: RetryState::Idle,
            generation: 0,
        }
    }

    /// Begin a new upload/analysis cycle. Clears any previous session state
    /// and returns the generation tag the eventual result must carry.
    pub fn begin_analysis(&mut self) -> u64 {
        self.reset();
        self.generation += 1;
        self.phase = Phase::Analyzing {
            generation: self.generation,
        };
        info!(target: "chroma::session", "Analysis started (generation {})", self.generation);
        self.generation
    }

    /// Apply an analysis result. Returns `false` when the result is stale
    /// (the user started a newer upload while this one was in flight).
    pub fn complete_analysis(&mut self, generation: u64, text: impl Into<String>) -> bool {
        match self.phase {
            Phase::Analyzing { generation: current } if current == generation => {
                self.analysis = Some(text.into());
                self.phase = Phase::Ready;
                self.retry = RetryState::Idle;
                self.transcript.clear();
                self.transcript
                    .push(TranscriptMessage::assistant(ANALYSIS_READY_NOTICE));
                info!(target: "chroma::session", "Analysis ready (generation {})", generation);
                true
            }
            _ => {
                debug!(
                    target: "chroma::session",
                    "Discarding stale analysis result (generation {})", generation
                );
                false
            }
        }
    }

    /// Guard for starting a session: returns the analysis seed when the
    /// session is Ready, errors when already connected or nothing analyzed.
    pub fn analysis_for_start(&self) -> crate::error::SessionResult<String> {
        match self.phase {
            Phase::Connected => Err(crate::error::SessionError::AlreadyConnected),
            Phase::Ready => Ok(self
                .analysis
                .clone()
                .unwrap_or_default()),
            Phase::Idle => Err(crate::error::SessionError::NotReady(
                "no outfit analyzed yet".to_string(),
            )),
            Phase::Analyzing { .. } => Err(crate::error::SessionError::NotReady(
                "analysis still in flight".to_string(),
            )),
        }
    }

    /// Record an explicit (user-initiated) session start request.
    pub fn mark_start_requested(&mut self) {
        self.retry = RetryState::Idle;
    }

    /// End the session. Idempotent: calling twice lands in the same state.
    pub fn end_session(&mut self) {
        info!(target: "chroma::session", "Session ended");
        self.reset();
    }

    /// Record a client-acknowledged mute change.
    pub fn acknowledge_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Ingest one event from the voice client.
    pub fn handle_event(&mut self, event: VoiceEvent) -> Option<Directive> {
        match event {
            VoiceEvent::CallStart => {
                info!(target: "chroma::session", "Call started");
                self.phase = Phase::Connected;
                self.transcript.push(TranscriptMessage::assistant(GREETING));
                None
            }
            VoiceEvent::CallEnd => {
                info!(target: "chroma::session", "Call ended");
                self.speaking = false;
                // The analysis seed survives a dropped call so a reconnect
                // can reuse it.
                self.phase = if self.analysis.is_some() {
                    Phase::Ready
                } else {
                    Phase::Idle
                };
                None
            }
            VoiceEvent::Transcript { role, text } => {
                self.transcript.push(TranscriptMessage::new(role, text));
                None
            }
            VoiceEvent::SpeechStart => {
                self.speaking = true;
                None
            }
            VoiceEvent::SpeechEnd => {
                self.speaking = false;
                None
            }
            VoiceEvent::Error { message } => {
                warn!(target: "chroma::session", "Voice client error: {}", message);
                self.transcript
                    .push(TranscriptMessage::assistant(CONNECTION_APOLOGY));
                self.next_reconnect()
            }
        }
    }

    /// Decide whether an error warrants another automatic reconnect.
    fn next_reconnect(&mut self) -> Option<Directive> {
        if self.phase == Phase::Connected {
            // Still connected: the provider recovered on its own.
            return None;
        }
        if self.analysis.is_none() {
            return None;
        }
        match self.retry {
            RetryState::Idle => {
                self.retry = RetryState::Retrying { attempt: 1 };
                info!(target: "chroma::session", "Scheduling reconnect attempt 1/{}", MAX_RECONNECT_ATTEMPTS);
                Some(Directive::Reconnect { attempt: 1 })
            }
            RetryState::Retrying { attempt } if attempt < MAX_RECONNECT_ATTEMPTS => {
                let attempt = attempt + 1;
                self.retry = RetryState::Retrying { attempt };
                info!(target: "chroma::session", "Scheduling reconnect attempt {}/{}", attempt, MAX_RECONNECT_ATTEMPTS);
                Some(Directive::Reconnect { attempt })
            }
            RetryState::Retrying { .. } => {
                warn!(
                    target: "chroma::session",
                    "Maximum reconnection attempts reached. A new upload is required."
                );
                self.retry = RetryState::GaveUp;
                None
            }
            RetryState::GaveUp => None,
        }
    }

    fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.analysis = None;
        self.transcript.clear();
        self.muted = false;
        self.speaking = false;
        self.retry = RetryState::Idle;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase == Phase::Connected
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn analysis(&self) -> Option<&str> {
        self.analysis.as_deref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn retry_state(&self) -> RetryState {
        self.retry
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let (attempts, gave_up) = match self.retry {
            RetryState::Idle => (0, false),
            RetryState::Retrying { attempt } => (attempt, false),
            RetryState::GaveUp => (MAX_RECONNECT_ATTEMPTS, true),
        };
        StateSnapshot {
            phase: match self.phase {
                Phase::Idle => "idle",
                Phase::Analyzing { .. } => "analyzing",
                Phase::Ready => "ready",
                Phase::Connected => "connected",
            },
            connected: self.is_connected(),
            muted: self.muted,
            speaking: self.speaking,
            reconnect_attempts: attempts,
            gave_up,
        }
    }
}
