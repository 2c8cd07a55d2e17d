//! The seam to the external voice service: events, session config, and the
//! `VoiceClient` trait.
//!
//! Event listeners are modeled as subscriptions with drop-based cleanup, so a
//! detaching consumer can never leave a dangling listener behind across
//! session restarts.

use crate::error::SessionResult;
use async_trait::async_trait;
use chroma_core::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

/// Events pushed asynchronously by the external voice service.
///
/// Wire format is the provider's kebab-case tagged JSON, e.g.
/// `{"type":"transcript","role":"assistant","transcript":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VoiceEvent {
    CallStart,
    CallEnd,
    Transcript {
        role: Role,
        #[serde(rename = "transcript")]
        text: String,
    },
    SpeechStart,
    SpeechEnd,
    Error {
        #[serde(default)]
        message: String,
    },
}

/// How the assistant opens the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FirstMessageMode {
    AssistantWaitsForUser,
    AssistantSpeaksFirst,
}

/// Per-session configuration handed to `VoiceClient::start`: the seed context
/// from the vision analysis plus conversation-opening behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// System-message content embedding the outfit analysis.
    pub system_context: String,
    pub first_message_mode: FirstMessageMode,
}

impl SessionConfig {
    /// Build the canonical session seed from an analysis text. The framing
    /// asks the assistant to hold the analysis as silent context.
    pub fn seeded_with(analysis: &str) -> Self {
        let system_context = format!(
            "The user has uploaded an image of their outfit. Here is the analysis \
             from our vision model. Use this as context for your conversation. \
             Do not mention this analysis unless the user asks about it. \n\nANALYSIS:\n{}",
            analysis
        );
        Self {
            system_context,
            first_message_mode: FirstMessageMode::AssistantWaitsForUser,
        }
    }
}

/// Handle to the voice service. Exactly one live client exists per process;
/// the gateway owns it and passes it by reference into the session driver.
#[async_trait]
pub trait VoiceClient: Send + Sync {
    /// Start a call with the given assistant, seeded with `session`.
    async fn start(&self, assistant_id: &str, session: SessionConfig) -> SessionResult<()>;

    /// Stop the current call. Safe to call when no call is active.
    async fn stop(&self) -> SessionResult<()>;

    /// Mute or unmute the user's side of the call.
    async fn set_muted(&self, muted: bool) -> SessionResult<()>;

    /// Subscribe to the client's event stream. Dropping the subscription
    /// deregisters the listener.
    fn subscribe(&self) -> EventSubscription;
}

type Subscribers = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<VoiceEvent>>>>;

/// Fan-out of voice events to any number of subscriptions.
#[derive(Clone, Default)]
pub struct EventBus {
    next_id: Arc<AtomicU64>,
    subscribers: Subscribers,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. The returned handle deregisters itself on drop.
    pub fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("subscriber registry poisoned")
            .insert(id, tx);
        EventSubscription {
            id,
            rx,
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// Deliver an event to every live subscription.
    pub fn publish(&self, event: VoiceEvent) {
        let subscribers = self
            .subscribers
            .lock()
            .expect("subscriber registry poisoned");
        for tx in subscribers.values() {
            // A closed receiver is cleaned up by its subscription's Drop.
            let _ = tx.send(event.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber registry poisoned")
            .len()
    }
}

/// A registered event listener. Dropping it removes the registration, keeping
/// register/cleanup symmetric across session restarts.
pub struct EventSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<VoiceEvent>,
    subscribers: Subscribers,
}

impl EventSubscription {
    /// Receive the next event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<VoiceEvent> {
        self.rx.recv().await
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(&self.id);
            debug!(target: "chroma::session", "Event subscription {} released", self.id);
        }
    }
}
