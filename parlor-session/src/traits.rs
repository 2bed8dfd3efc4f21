use async_trait::async_trait;
use parlor_core::types::ParticipantIdentity;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Local audio capture processing. All three default to enabled: the whole
/// point of the client is hands-free conversation in the same room as the
/// speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOptions {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRequest {
    pub room_name: Option<String>,
    pub participant_name: String,
}

/// Credential handed out by the token backend. The token itself is redacted
/// from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub token: String,
    pub url: String,
    pub room_name: String,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("token", &"[REDACTED]")
            .field("url", &self.url)
            .field("room_name", &self.room_name)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    ClientInitiated,
    ServerClosed,
    TransportError(String),
}

/// One incremental speech-to-text result. `id` is stable from the first
/// partial through the final update of the same utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionSegment {
    pub id: String,
    pub text: String,
    pub is_final: bool,
}

/// Everything the transport can tell us, fanned into one ordered stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    TrackSubscribed {
        kind: TrackKind,
        participant: ParticipantIdentity,
    },
    TrackUnsubscribed {
        kind: TrackKind,
        participant: ParticipantIdentity,
    },
    /// Reports the full current set of active speakers, not a delta.
    ActiveSpeakersChanged { speakers: Vec<ParticipantIdentity> },
    DataReceived { payload: Vec<u8> },
    TranscriptionReceived {
        participant: ParticipantIdentity,
        segments: Vec<TranscriptionSegment>,
    },
    Disconnected { reason: DisconnectReason },
}

#[async_trait]
pub trait TokenService: Send + Sync {
    async fn issue(&self, request: &TokenRequest) -> anyhow::Result<TokenGrant>;
}

/// Seam over the media transport/signaling library.
///
/// `connect` hands back the event stream for that connection; dropping the
/// receiver is how the coordinator unregisters from a torn-down session, so
/// implementations must not block on a full channel forever.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        token: &str,
        capture: &CaptureOptions,
    ) -> anyhow::Result<mpsc::Receiver<TransportEvent>>;

    async fn disconnect(&self);

    async fn set_microphone_enabled(&self, enabled: bool) -> anyhow::Result<()>;

    fn local_identity(&self) -> ParticipantIdentity;
}
