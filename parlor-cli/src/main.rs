use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parlor_core::types::{ParticipantIdentity, Role};
use parlor_providers::token::TokenEndpointConfig;
use parlor_session::coordinator::{SessionConfig, SessionCoordinator};
use parlor_session::traits::{
    CaptureOptions, MediaTransport, TokenGrant, TokenRequest, TokenService, TrackKind,
    TranscriptionSegment, TransportEvent,
};
use tokio::sync::mpsc;

struct HttpTokens {
    cfg: TokenEndpointConfig,
}

#[async_trait::async_trait]
impl TokenService for HttpTokens {
    async fn issue(&self, request: &TokenRequest) -> anyhow::Result<TokenGrant> {
        let grant = parlor_providers::token::fetch_token(
            &self.cfg,
            request.room_name.as_deref(),
            &request.participant_name,
        )
        .await?;
        Ok(TokenGrant {
            token: grant.token,
            url: grant.url,
            room_name: grant.room_name,
        })
    }
}

struct StaticTokens;

#[async_trait::async_trait]
impl TokenService for StaticTokens {
    async fn issue(&self, _request: &TokenRequest) -> anyhow::Result<TokenGrant> {
        Ok(TokenGrant {
            token: "offline".into(),
            url: "wss://offline.invalid".into(),
            room_name: "renovation-demo".into(),
        })
    }
}

/// In-process stand-in for the media transport: replays a short renovation
/// consultation so the coordinator can be exercised end to end without a
/// media server.
struct ScriptedTransport {
    local: ParticipantIdentity,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self {
            local: ParticipantIdentity::new("user-demo"),
        }
    }
}

#[async_trait::async_trait]
impl MediaTransport for ScriptedTransport {
    async fn connect(
        &self,
        _url: &str,
        _token: &str,
        _capture: &CaptureOptions,
    ) -> anyhow::Result<mpsc::Receiver<TransportEvent>> {
        let (tx, rx) = mpsc::channel(32);
        let local = self.local.clone();
        tokio::spawn(replay(tx, local));
        Ok(rx)
    }

    async fn disconnect(&self) {}

    async fn set_microphone_enabled(&self, enabled: bool) -> anyhow::Result<()> {
        log::debug!("microphone enabled: {enabled}");
        Ok(())
    }

    fn local_identity(&self) -> ParticipantIdentity {
        self.local.clone()
    }
}

async fn replay(tx: mpsc::Sender<TransportEvent>, local: ParticipantIdentity) {
    let agent = ParticipantIdentity::new("agent-renovation");

    let user = |id: &str, text: &str, is_final: bool| TransportEvent::TranscriptionReceived {
        participant: local.clone(),
        segments: vec![TranscriptionSegment {
            id: id.into(),
            text: text.into(),
            is_final,
        }],
    };
    let assistant = |id: &str, text: &str, is_final: bool| TransportEvent::TranscriptionReceived {
        participant: agent.clone(),
        segments: vec![TranscriptionSegment {
            id: id.into(),
            text: text.into(),
            is_final,
        }],
    };
    let speaking = |on: bool| TransportEvent::ActiveSpeakersChanged {
        speakers: if on { vec![agent.clone()] } else { vec![] },
    };
    let data = |json: &str| TransportEvent::DataReceived {
        payload: json.as_bytes().to_vec(),
    };

    let script = vec![
        TransportEvent::TrackSubscribed {
            kind: TrackKind::Audio,
            participant: agent.clone(),
        },
        user("u1", "Hi, I want to redo my", false),
        user("u1", "Hi, I want to redo my kitchen.", true),
        speaking(true),
        assistant("a1", "Great, kitchens are", false),
        assistant("a1", "Great, kitchens are my favorite. What's your budget?", true),
        speaking(false),
        user("u2", "Around twenty thousand.", true),
        data(r#"{"type":"agent_switch","agent":"alice"}"#),
        speaking(true),
        assistant(
            "a2",
            "Alice here. For twenty thousand I'd start with cabinets and counters.",
            true,
        ),
        speaking(false),
        data(r#"{"type":"conversation_end"}"#),
    ];

    for event in script {
        tokio::time::sleep(Duration::from_millis(400)).await;
        if tx.send(event).await.is_err() {
            return;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Demo behavior: scripted transport, real coordinator. Point
    // PARLOR_TOKEN_URL at a token backend (e.g. http://localhost:8000/api)
    // to exercise the HTTP credential path; otherwise a static grant is used.
    let tokens: Arc<dyn TokenService> = match std::env::var("PARLOR_TOKEN_URL") {
        Ok(base) if !base.is_empty() => Arc::new(HttpTokens {
            cfg: TokenEndpointConfig { base_url: base },
        }),
        _ => Arc::new(StaticTokens),
    };

    let transport = Arc::new(ScriptedTransport::new());
    let handle = SessionCoordinator::spawn(SessionConfig::default(), tokens, transport);
    handle.connect().await?;

    let mut rx = handle.watch();
    let mut printed: HashSet<String> = HashSet::new();
    let mut room: Option<String> = None;

    loop {
        let snap = rx.borrow().clone();
        if snap.room_name.is_some() {
            room = snap.room_name.clone();
        }
        if let Some(err) = &snap.last_error {
            eprintln!("connection failed: {err}");
            return Ok(());
        }
        for m in &snap.messages {
            if !m.transcribing && printed.insert(m.id.clone()) {
                match m.role {
                    Role::User => println!("you: {}", m.content),
                    Role::Assistant => {
                        let who = m.agent.map(|a| a.as_str()).unwrap_or("agent");
                        println!("{who}: {}", m.content);
                    }
                }
            }
        }
        if snap.ended {
            println!(
                "conversation in {} ended.",
                room.as_deref().unwrap_or("room")
            );
            return Ok(());
        }
        if rx.changed().await.is_err() {
            return Ok(());
        }
    }
}
