use crate::types::AgentId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Flags describing one live call. Owned exclusively by the coordinator for
/// the lifetime of that call; a new conversation constructs a fresh value
/// instead of patching the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub connection: ConnectionState,

    // Assigned by the backend at connect time.
    pub room_name: Option<String>,

    // Which agent currently holds the conversational turn.
    pub active_agent: AgentId,
    pub mic_muted: bool,
    pub agent_speaking: bool,

    // Whether agent audio is rendered. Independent of mic state.
    pub voice_output_enabled: bool,

    // Awaiting an agent reply: set after the user's final segment, cleared
    // when any agent output arrives.
    pub thinking: bool,

    // One-way until a fresh session is created.
    pub ended: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            room_name: None,
            active_agent: AgentId::Bob,
            mic_muted: false,
            agent_speaking: false,
            voice_output_enabled: true,
            thinking: false,
            ended: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_defaults() {
        let s = SessionState::default();
        assert_eq!(s.connection, ConnectionState::Disconnected);
        assert_eq!(s.active_agent, AgentId::Bob);
        assert!(s.voice_output_enabled);
        assert!(!s.mic_muted);
        assert!(!s.ended);
        assert!(s.room_name.is_none());
    }
}
