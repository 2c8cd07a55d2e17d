//! Wire implementation of [`VoiceClient`] over the voice provider's REST +
//! websocket transport.
//!
//! `start` creates the call over REST (embedding the session seed as a system
//! message), then attaches to the returned websocket URL. A reader task
//! translates the provider's kebab-case JSON frames into [`VoiceEvent`]s and
//! fans them out through the shared [`EventBus`]; a writer task carries
//! control frames (hangup, mute) back. Binary audio frames pass through the
//! provider's own playback path and are ignored here.

use crate::client::{
    EventBus, EventSubscription, FirstMessageMode, SessionConfig, VoiceClient, VoiceEvent,
};
use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

const DEFAULT_API_BASE: &str = "https://api.vapi.ai";
const SEED_MODEL_PROVIDER: &str = "openai";
const SEED_MODEL: &str = "gpt-4o";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCallRequest<'a> {
    assistant_id: &'a str,
    assistant_overrides: AssistantOverrides,
    transport: TransportRequest,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssistantOverrides {
    model: ModelOverride,
    first_message_mode: FirstMessageMode,
}

#[derive(Serialize)]
struct ModelOverride {
    provider: &'static str,
    model: &'static str,
    messages: Vec<WireMessage>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCallResponse {
    id: String,
    transport: TransportInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransportInfo {
    websocket_call_url: String,
}

/// Control frames sent to the provider over the websocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ControlFrame {
    Hangup,
    SetMuted { muted: bool },
}

struct ActiveCall {
    call_id: String,
    control_tx: mpsc::UnboundedSender<ControlFrame>,
}

/// Voice client over the provider's REST + websocket API.
///
/// The active-call slot is shared with the reader task: when the provider
/// closes the stream the reader clears it before publishing `CallEnd`, so a
/// subsequent `start` is never blocked by a call that no longer exists.
pub struct WireVoiceClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    bus: EventBus,
    active: Arc<Mutex<Option<ActiveCall>>>,
}

impl WireVoiceClient {
    /// Create a client with the public key from the environment. Fails fast
    /// with a descriptive error when the key is missing.
    pub fn from_env() -> SessionResult<Self> {
        let api_key = chroma_core::voice_public_key()?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key.trim().to_string(),
            base_url: DEFAULT_API_BASE.to_string(),
            http,
            bus: EventBus::new(),
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Override the API base URL (tests, self-hosted deployments).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn create_call(
        &self,
        assistant_id: &str,
        session: &SessionConfig,
    ) -> SessionResult<CreateCallResponse> {
        let body = CreateCallRequest {
            assistant_id,
            assistant_overrides: AssistantOverrides {
                model: ModelOverride {
                    provider: SEED_MODEL_PROVIDER,
                    model: SEED_MODEL,
                    messages: vec![WireMessage {
                        role: "system",
                        content: session.system_context.clone(),
                    }],
                },
                first_message_mode: session.first_message_mode,
            },
            transport: TransportRequest {
                provider: "vapi.websocket",
            },
        };

        let res = self
            .http
            .post(format!("{}/call", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SessionError::Client(format!(
                "call creation failed ({}): {}",
                status, body
            )));
        }

        res.json()
            .await
            .map_err(|e| SessionError::Transport(format!("call response parse failed: {}", e)))
    }
}

#[derive(Serialize)]
struct TransportRequest {
    provider: &'static str,
}

#[async_trait]
impl VoiceClient for WireVoiceClient {
    async fn start(&self, assistant_id: &str, session: SessionConfig) -> SessionResult<()> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(SessionError::AlreadyConnected);
        }

        let call = self.create_call(assistant_id, &session).await?;
        info!(target: "chroma::session", "Call {} created, attaching transport", call.id);

        let (ws, _) = connect_async(call.transport.websocket_call_url.as_str())
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let (control_tx, mut control_rx) = mpsc::unbounded_channel::<ControlFrame>();
        tokio::spawn(async move {
            while let Some(frame) = control_rx.recv().await {
                let hangup = matches!(frame, ControlFrame::Hangup);
                let text = match serde_json::to_string(&frame) {
                    Ok(t) => t,
                    Err(_) => continue,
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
                if hangup {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        });

        let bus = self.bus.clone();
        let active_slot = Arc::clone(&self.active);
        let call_id = call.id.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<VoiceEvent>(&text) {
                        Ok(event) => bus.publish(event),
                        Err(_) => {
                            debug!(target: "chroma::session", "Ignoring unrecognized frame")
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    // Binary frames carry call audio; not consumed here.
                    Ok(_) => {}
                    Err(e) => {
                        bus.publish(VoiceEvent::Error {
                            message: e.to_string(),
                        });
                        break;
                    }
                }
            }
            // Clear the slot before announcing the end, so listeners reacting
            // to `CallEnd` can start a new call immediately. Only this call's
            // own entry is evicted; a replacement installed by `stop` + a new
            // `start` is left alone.
            {
                let mut slot = active_slot.lock().await;
                if slot.as_ref().is_some_and(|c| c.call_id == call_id) {
                    slot.take();
                }
            }
            bus.publish(VoiceEvent::CallEnd);
        });

        *active = Some(ActiveCall {
            call_id: call.id,
            control_tx,
        });
        Ok(())
    }

    async fn stop(&self) -> SessionResult<()> {
        let mut active = self.active.lock().await;
        if let Some(call) = active.take() {
            info!(target: "chroma::session", "Hanging up call {}", call.call_id);
            if call.control_tx.send(ControlFrame::Hangup).is_err() {
                warn!(target: "chroma::session", "Transport already gone during hangup");
            }
        }
        Ok(())
    }

    async fn set_muted(&self, muted: bool) -> SessionResult<()> {
        let active = self.active.lock().await;
        let call = active.as_ref().ok_or(SessionError::NoActiveCall)?;
        call.control_tx
            .send(ControlFrame::SetMuted { muted })
            .map_err(|e| SessionError::ChannelSend(e.to_string()))
    }

    fn subscribe(&self) -> EventSubscription {
        self.bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Websocket server that completes the handshake and hangs up at once.
    async fn spawn_dropping_ws_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    if let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await {
                        let _ = ws.close(None).await;
                    }
                });
            }
        });
        addr
    }

    /// Minimal `POST /call` endpoint answering every request with a call that
    /// points at `ws_addr`.
    async fn spawn_call_endpoint(ws_addr: SocketAddr) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 16 * 1024];
                    let mut read = 0;
                    loop {
                        match stream.read(&mut buf[read..]).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                read += n;
                                let head = &buf[..read];
                                let Some(end) =
                                    head.windows(4).position(|w| w == b"\r\n\r\n")
                                else {
                                    continue;
                                };
                                let headers = String::from_utf8_lossy(&head[..end]);
                                let body_len = headers
                                    .lines()
                                    .find_map(|l| {
                                        let (name, value) = l.split_once(':')?;
                                        name.eq_ignore_ascii_case("content-length")
                                            .then(|| value.trim().parse::<usize>().ok())?
                                    })
                                    .unwrap_or(0);
                                if read >= end + 4 + body_len {
                                    break;
                                }
                            }
                        }
                    }
                    let body = format!(
                        r#"{{"id":"call_test","transport":{{"websocketCallUrl":"ws://{}/call"}}}}"#,
                        ws_addr
                    );
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });
        addr
    }

    #[test]
    fn create_call_request_shape_matches_the_provider_contract() {
        let session = SessionConfig::seeded_with("a navy coat");
        let body = CreateCallRequest {
            assistant_id: "asst_1",
            assistant_overrides: AssistantOverrides {
                model: ModelOverride {
                    provider: SEED_MODEL_PROVIDER,
                    model: SEED_MODEL,
                    messages: vec![WireMessage {
                        role: "system",
                        content: session.system_context.clone(),
                    }],
                },
                first_message_mode: session.first_message_mode,
            },
            transport: TransportRequest {
                provider: "vapi.websocket",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["assistantId"], "asst_1");
        assert_eq!(
            json["assistantOverrides"]["firstMessageMode"],
            "assistant-waits-for-user"
        );
        assert_eq!(
            json["assistantOverrides"]["model"]["messages"][0]["role"],
            "system"
        );
        assert_eq!(json["transport"]["provider"], "vapi.websocket");
    }

    #[test]
    fn call_response_parses_the_websocket_url() {
        let raw = r#"{"id":"call_9","transport":{"websocketCallUrl":"wss://example/call_9"}}"#;
        let parsed: CreateCallResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.id, "call_9");
        assert_eq!(parsed.transport.websocket_call_url, "wss://example/call_9");
    }

    #[test]
    fn control_frames_serialize_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ControlFrame::Hangup).unwrap(),
            r#"{"type":"hangup"}"#
        );
        assert_eq!(
            serde_json::to_string(&ControlFrame::SetMuted { muted: true }).unwrap(),
            r#"{"type":"set-muted","muted":true}"#
        );
    }

    #[tokio::test]
    async fn mute_without_an_active_call_is_an_error() {
        let client = WireVoiceClient::new("key".to_string());
        assert!(matches!(
            client.set_muted(true).await,
            Err(SessionError::NoActiveCall)
        ));
    }

    #[tokio::test]
    async fn stop_without_an_active_call_is_a_no_op() {
        let client = WireVoiceClient::new("key".to_string());
        assert!(client.stop().await.is_ok());
        assert!(client.stop().await.is_ok());
    }

    #[tokio::test]
    async fn start_succeeds_again_after_the_provider_closes_the_stream() {
        let ws_addr = spawn_dropping_ws_server().await;
        let api_addr = spawn_call_endpoint(ws_addr).await;
        let client = WireVoiceClient::new("key".to_string())
            .with_base_url(&format!("http://{}", api_addr));
        let mut events = client.subscribe();

        client
            .start("asst_1", SessionConfig::seeded_with("a navy coat"))
            .await
            .unwrap();

        // The provider hangs up right after the handshake. Once `CallEnd` is
        // observed the slot must already be clear, so a restart goes through
        // instead of reporting a call that no longer exists.
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("no call-end after the provider hangup");
            match event {
                Some(VoiceEvent::CallEnd) => break,
                Some(_) => {}
                None => panic!("event bus closed"),
            }
        }

        client
            .start("asst_1", SessionConfig::seeded_with("a navy coat"))
            .await
            .unwrap();
        client.stop().await.unwrap();
    }
}
