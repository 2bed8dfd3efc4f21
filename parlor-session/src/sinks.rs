use parlor_core::types::ParticipantIdentity;
use serde::{Deserialize, Serialize};

/// One renderable audio output, tagged with the participant it plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSink {
    pub participant: ParticipantIdentity,
    pub muted: bool,
}

/// Live remote-audio sinks. The muted bit tracks `voice_output_enabled`;
/// the rendering layer reads this list and attaches real playback to it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkRegistry {
    sinks: Vec<AudioSink>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sink for a subscribed audio track, replacing any earlier
    /// sink for the same participant.
    pub fn attach(&mut self, participant: ParticipantIdentity, muted: bool) {
        self.detach(&participant);
        self.sinks.push(AudioSink { participant, muted });
    }

    pub fn detach(&mut self, participant: &ParticipantIdentity) {
        self.sinks.retain(|s| &s.participant != participant);
    }

    pub fn set_all_muted(&mut self, muted: bool) {
        for sink in &mut self.sinks {
            sink.muted = muted;
        }
    }

    pub fn clear(&mut self) {
        self.sinks.clear();
    }

    pub fn sinks(&self) -> &[AudioSink] {
        &self.sinks
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_replaces_an_existing_sink_for_the_same_participant() {
        let mut reg = SinkRegistry::new();
        let p = ParticipantIdentity::new("agent-worker");

        reg.attach(p.clone(), false);
        reg.attach(p.clone(), true);

        assert_eq!(reg.len(), 1);
        assert!(reg.sinks()[0].muted);
    }

    #[test]
    fn toggling_voice_output_flips_every_live_sink() {
        let mut reg = SinkRegistry::new();
        reg.attach(ParticipantIdentity::new("agent-1"), false);
        reg.attach(ParticipantIdentity::new("agent-2"), false);

        reg.set_all_muted(true);
        assert!(reg.sinks().iter().all(|s| s.muted));
    }

    #[test]
    fn detach_removes_only_the_named_participant() {
        let mut reg = SinkRegistry::new();
        let a = ParticipantIdentity::new("agent-1");
        let b = ParticipantIdentity::new("agent-2");
        reg.attach(a.clone(), false);
        reg.attach(b.clone(), false);

        reg.detach(&a);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.sinks()[0].participant, b);
    }
}
