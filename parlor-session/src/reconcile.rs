use crate::traits::TranscriptionSegment;
use parlor_core::message::Message;
use parlor_core::types::{AgentId, ParticipantIdentity, Role};

/// Session context a segment is reconciled against, captured at receipt time
/// so handlers always see the current active agent.
#[derive(Debug, Clone)]
pub struct ReconcileContext<'a> {
    pub local_identity: &'a ParticipantIdentity,
    pub voice_output_enabled: bool,
    pub active_agent: AgentId,
    pub now_unix_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingEffect {
    /// The user finished an utterance; an agent reply is now pending.
    Set,
    /// An agent has begun responding.
    Clear,
    Keep,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentOutcome {
    /// Agent transcript while voice output is off: the full text arrives as
    /// an instant response instead, so upserting here would duplicate it.
    Discard,
    Upsert(Message),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub thinking: ThinkingEffect,
    pub outcome: SegmentOutcome,
}

/// Maps one transcription segment onto a store mutation. Pure; the
/// coordinator applies outcomes in arrival order and never reorders.
pub fn reconcile_segment(
    segment: &TranscriptionSegment,
    participant: &ParticipantIdentity,
    ctx: &ReconcileContext<'_>,
) -> Reconciled {
    let from_agent = participant != ctx.local_identity;

    let thinking = if from_agent {
        ThinkingEffect::Clear
    } else if segment.is_final {
        ThinkingEffect::Set
    } else {
        ThinkingEffect::Keep
    };

    if from_agent && !ctx.voice_output_enabled {
        return Reconciled {
            thinking,
            outcome: SegmentOutcome::Discard,
        };
    }

    // Namespaced key: repeated updates to the same utterance hit the same
    // message, and user/agent segments can never collide on a raw id.
    let (prefix, role) = if from_agent {
        ("agent", Role::Assistant)
    } else {
        ("user", Role::User)
    };

    let message = Message {
        id: format!("{prefix}-{}", segment.id),
        role,
        agent: from_agent.then_some(ctx.active_agent),
        content: segment.text.clone(),
        transcribing: !segment.is_final,
        ts_unix_ms: ctx.now_unix_ms,
    };

    Reconciled {
        thinking,
        outcome: SegmentOutcome::Upsert(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(local: &'a ParticipantIdentity, voice: bool) -> ReconcileContext<'a> {
        ReconcileContext {
            local_identity: local,
            voice_output_enabled: voice,
            active_agent: AgentId::Alice,
            now_unix_ms: 42,
        }
    }

    fn segment(id: &str, text: &str, is_final: bool) -> TranscriptionSegment {
        TranscriptionSegment {
            id: id.into(),
            text: text.into(),
            is_final,
        }
    }

    #[test]
    fn local_partial_upserts_without_touching_thinking() {
        let local = ParticipantIdentity::new("user-1");
        let r = reconcile_segment(&segment("s1", "hel", false), &local, &ctx(&local, true));

        assert_eq!(r.thinking, ThinkingEffect::Keep);
        match r.outcome {
            SegmentOutcome::Upsert(m) => {
                assert_eq!(m.id, "user-s1");
                assert_eq!(m.role, Role::User);
                assert_eq!(m.agent, None);
                assert!(m.transcribing);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn local_final_signals_pending_agent_reply() {
        let local = ParticipantIdentity::new("user-1");
        let r = reconcile_segment(&segment("s1", "hello", true), &local, &ctx(&local, true));

        assert_eq!(r.thinking, ThinkingEffect::Set);
        match r.outcome {
            SegmentOutcome::Upsert(m) => assert!(!m.transcribing),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn agent_segment_clears_thinking_and_carries_the_active_agent() {
        let local = ParticipantIdentity::new("user-1");
        let agent = ParticipantIdentity::new("agent-worker");
        let r = reconcile_segment(&segment("s7", "Happy to", false), &agent, &ctx(&local, true));

        assert_eq!(r.thinking, ThinkingEffect::Clear);
        match r.outcome {
            SegmentOutcome::Upsert(m) => {
                assert_eq!(m.id, "agent-s7");
                assert_eq!(m.role, Role::Assistant);
                assert_eq!(m.agent, Some(AgentId::Alice));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn agent_segment_is_discarded_while_voice_output_is_off() {
        let local = ParticipantIdentity::new("user-1");
        let agent = ParticipantIdentity::new("agent-worker");
        let r = reconcile_segment(&segment("s2", "Sure", true), &agent, &ctx(&local, false));

        assert_eq!(r.outcome, SegmentOutcome::Discard);
        // Still counts as the agent responding.
        assert_eq!(r.thinking, ThinkingEffect::Clear);
    }

    #[test]
    fn user_segments_are_kept_even_with_voice_output_off() {
        let local = ParticipantIdentity::new("user-1");
        let r = reconcile_segment(&segment("s3", "hi", true), &local, &ctx(&local, false));
        assert!(matches!(r.outcome, SegmentOutcome::Upsert(_)));
    }
}
