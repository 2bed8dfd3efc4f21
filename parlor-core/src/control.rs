use crate::types::AgentId;
use serde::Deserialize;
use thiserror::Error;

/// Out-of-band control messages, one JSON object per payload, discriminated
/// by `type`. Unknown fields are ignored; unknown `type` values fail to
/// decode and the caller drops them (forward compatibility).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    AgentSwitch { agent: AgentId },
    ConversationEnd,
    AgentResponse { agent: AgentId, text: String },
}

#[derive(Debug, Error)]
pub enum ControlDecodeError {
    #[error("control payload is not a recognized JSON message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes a raw data-channel payload. The channel is best-effort and shares
/// the transport with other traffic, so callers are expected to drop errors
/// without surfacing them.
pub fn decode_control(payload: &[u8]) -> Result<ControlMessage, ControlDecodeError> {
    Ok(serde_json::from_slice(payload)?)
}
