use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantIdentity(pub String);

impl ParticipantIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two conversational agents. Serde names match the control-channel
/// wire format (`"bob"` / `"alice"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    Bob,
    Alice,
}

impl AgentId {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Bob => "bob",
            AgentId::Alice => "alice",
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_serde_names_match_wire_format() {
        assert_eq!(serde_json::to_string(&AgentId::Bob).unwrap(), r#""bob""#);
        let parsed: AgentId = serde_json::from_str(r#""alice""#).unwrap();
        assert_eq!(parsed, AgentId::Alice);
    }

    #[test]
    fn participant_identity_compares_by_value() {
        let a = ParticipantIdentity::new("user-abc123");
        let b = ParticipantIdentity::new("user-abc123");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "user-abc123");
    }
}
