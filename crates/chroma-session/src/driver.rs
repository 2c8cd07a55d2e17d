//! Async session driver: owns the voice client handle and the coordinator,
//! serializes every state transition, and performs the timed reconnects the
//! coordinator asks for.
//!
//! All mutation happens on event/command dispatch under one lock; there is no
//! concurrent access to the coordinator.

use crate::client::{SessionConfig, VoiceClient};
use crate::coordinator::{Directive, SessionCoordinator};
use crate::error::SessionResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// One voice session, end to end. The gateway holds exactly one of these,
/// which is what makes the single-active-session invariant structural.
pub struct Session {
    client: Arc<dyn VoiceClient>,
    assistant_id: String,
    reconnect_delay: Duration,
    coordinator: Arc<Mutex<SessionCoordinator>>,
}

impl Session {
    pub fn new(
        client: Arc<dyn VoiceClient>,
        assistant_id: impl Into<String>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            client,
            assistant_id: assistant_id.into(),
            reconnect_delay,
            coordinator: Arc::new(Mutex::new(SessionCoordinator::new())),
        }
    }

    /// Shared coordinator handle, for read-only snapshots at the HTTP edge.
    pub fn coordinator(&self) -> Arc<Mutex<SessionCoordinator>> {
        Arc::clone(&self.coordinator)
    }

    /// Begin a new upload cycle: stop any active call, clear state, and hand
    /// out the generation tag for the in-flight analysis.
    pub async fn begin_analysis(&self) -> u64 {
        let was_connected = self.coordinator.lock().await.is_connected();
        if was_connected {
            if let Err(e) = self.client.stop().await {
                warn!(target: "chroma::session", "Stop before new upload failed: {}", e);
            }
        }
        self.coordinator.lock().await.begin_analysis()
    }

    /// Apply an analysis result; stale generations are dropped.
    pub async fn complete_analysis(&self, generation: u64, text: impl Into<String>) -> bool {
        self.coordinator
            .lock()
            .await
            .complete_analysis(generation, text)
    }

    /// Start the voice session, seeding it with the stored analysis.
    pub async fn start(&self) -> SessionResult<()> {
        let analysis = {
            let mut coordinator = self.coordinator.lock().await;
            let analysis = coordinator.analysis_for_start()?;
            coordinator.mark_start_requested();
            analysis
        };
        info!(target: "chroma::session", "Starting voice session");
        self.client
            .start(&self.assistant_id, SessionConfig::seeded_with(&analysis))
            .await
    }

    /// End the session. Idempotent; safe when nothing is connected.
    pub async fn end(&self) -> SessionResult<()> {
        if let Err(e) = self.client.stop().await {
            warn!(target: "chroma::session", "Voice client stop failed: {}", e);
        }
        self.coordinator.lock().await.end_session();
        Ok(())
    }

    /// Toggle the microphone. State only changes once the client acknowledges
    /// the call, so a failing client cannot cause local-only drift.
    pub async fn toggle_mute(&self) -> SessionResult<bool> {
        let desired = !self.coordinator.lock().await.is_muted();
        self.client.set_muted(desired).await?;
        self.coordinator.lock().await.acknowledge_muted(desired);
        Ok(desired)
    }

    /// Drive the event loop until the client's event stream closes. Spawn
    /// this once; the subscription is released when the loop exits.
    pub async fn run(self: Arc<Self>) {
        let mut events = self.client.subscribe();
        while let Some(event) = events.recv().await {
            let directive = self.coordinator.lock().await.handle_event(event);
            if let Some(Directive::Reconnect { attempt }) = directive {
                let session = Arc::clone(&self);
                tokio::spawn(async move {
                    tokio::time::sleep(session.reconnect_delay).await;
                    session.reconnect(attempt).await;
                });
            }
        }
        info!(target: "chroma::session", "Voice event stream closed");
    }

    async fn reconnect(&self, attempt: u8) {
        let analysis = {
            let coordinator = self.coordinator.lock().await;
            if coordinator.is_connected() {
                return;
            }
            match coordinator.analysis() {
                Some(a) => a.to_string(),
                // The user cleared the session while the timer was pending.
                None => return,
            }
        };
        info!(target: "chroma::session", "Reconnect attempt {}", attempt);
        if let Err(e) = self
            .client
            .start(&self.assistant_id, SessionConfig::seeded_with(&analysis))
            .await
        {
            warn!(target: "chroma::session", "Reconnect attempt {} failed: {}", attempt, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{EventBus, EventSubscription, VoiceEvent};
    use crate::coordinator::{Phase, GREETING};
    use crate::error::SessionError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Records every call; events are injected through the shared bus.
    struct MockVoiceClient {
        bus: EventBus,
        calls: StdMutex<Vec<String>>,
        fail_mute: AtomicBool,
    }

    impl MockVoiceClient {
        fn new() -> Self {
            Self {
                bus: EventBus::new(),
                calls: StdMutex::new(Vec::new()),
                fail_mute: AtomicBool::new(false),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn start_count(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| c.starts_with("start"))
                .count()
        }
    }

    #[async_trait]
    impl VoiceClient for MockVoiceClient {
        async fn start(&self, assistant_id: &str, _session: SessionConfig) -> SessionResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("start:{assistant_id}"));
            Ok(())
        }

        async fn stop(&self) -> SessionResult<()> {
            self.calls.lock().unwrap().push("stop".to_string());
            Ok(())
        }

        async fn set_muted(&self, muted: bool) -> SessionResult<()> {
            if self.fail_mute.load(Ordering::Relaxed) {
                return Err(SessionError::Client("mute rejected".to_string()));
            }
            self.calls.lock().unwrap().push(format!("muted:{muted}"));
            Ok(())
        }

        fn subscribe(&self) -> EventSubscription {
            self.bus.subscribe()
        }
    }

    async fn ready_session(client: Arc<MockVoiceClient>) -> Arc<Session> {
        let session = Arc::new(Session::new(
            client,
            "asst_test",
            Duration::from_millis(10),
        ));
        let generation = session.begin_analysis().await;
        assert!(session.complete_analysis(generation, "navy coat analysis").await);
        session
    }

    #[tokio::test]
    async fn start_then_call_start_appends_one_greeting() {
        let client = Arc::new(MockVoiceClient::new());
        let session = ready_session(Arc::clone(&client)).await;
        tokio::spawn(Arc::clone(&session).run());
        // Let the event loop register its subscription before publishing.
        tokio::task::yield_now().await;

        session.start().await.unwrap();
        assert_eq!(client.calls(), vec!["start:asst_test".to_string()]);

        client.bus.publish(VoiceEvent::CallStart);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let coordinator = session.coordinator();
        let guard = coordinator.lock().await;
        assert_eq!(guard.phase(), Phase::Connected);
        let greetings = guard
            .transcript()
            .messages()
            .iter()
            .filter(|m| m.text == GREETING)
            .count();
        assert_eq!(greetings, 1);
    }

    #[tokio::test]
    async fn duplicate_start_is_rejected_while_connected() {
        let client = Arc::new(MockVoiceClient::new());
        let session = ready_session(Arc::clone(&client)).await;
        tokio::spawn(Arc::clone(&session).run());
        // Let the event loop register its subscription before publishing.
        tokio::task::yield_now().await;

        session.start().await.unwrap();
        client.bus.publish(VoiceEvent::CallStart);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(
            session.start().await,
            Err(SessionError::AlreadyConnected)
        ));
        assert_eq!(client.start_count(), 1);
    }

    #[tokio::test]
    async fn end_is_idempotent_and_clears_everything() {
        let client = Arc::new(MockVoiceClient::new());
        let session = ready_session(Arc::clone(&client)).await;
        tokio::spawn(Arc::clone(&session).run());

        session.start().await.unwrap();
        client.bus.publish(VoiceEvent::CallStart);
        tokio::time::sleep(Duration::from_millis(20)).await;

        session.end().await.unwrap();
        session.end().await.unwrap();

        let coordinator = session.coordinator();
        let guard = coordinator.lock().await;
        assert_eq!(guard.phase(), Phase::Idle);
        assert!(guard.transcript().is_empty());
        assert!(guard.analysis().is_none());
    }

    #[tokio::test]
    async fn three_errors_produce_exactly_two_reconnect_starts() {
        let client = Arc::new(MockVoiceClient::new());
        let session = ready_session(Arc::clone(&client)).await;
        tokio::spawn(Arc::clone(&session).run());

        for _ in 0..3 {
            client.bus.publish(VoiceEvent::Error {
                message: "socket closed".to_string(),
            });
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Let both reconnect timers fire; the third error schedules nothing.
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(client.start_count(), 2);
    }

    #[tokio::test]
    async fn mute_state_only_changes_on_client_acknowledgment() {
        let client = Arc::new(MockVoiceClient::new());
        let session = ready_session(Arc::clone(&client)).await;

        assert!(session.toggle_mute().await.unwrap());
        {
            let coordinator = session.coordinator();
            assert!(coordinator.lock().await.is_muted());
        }

        client.fail_mute.store(true, Ordering::Relaxed);
        assert!(session.toggle_mute().await.is_err());
        let coordinator = session.coordinator();
        assert!(coordinator.lock().await.is_muted());
    }

    #[tokio::test]
    async fn reconnect_is_skipped_after_the_session_was_cleared() {
        let client = Arc::new(MockVoiceClient::new());
        let session = ready_session(Arc::clone(&client)).await;
        tokio::spawn(Arc::clone(&session).run());

        client.bus.publish(VoiceEvent::Error {
            message: "drop".to_string(),
        });
        tokio::time::sleep(Duration::from_millis(2)).await;
        session.end().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // end() issued the only stop; the pending reconnect found no analysis.
        assert_eq!(client.start_count(), 0);
    }
}
