use std::time::Duration;
use tokio::time::Instant;

pub const UNMUTE_DEBOUNCE: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDecision {
    /// A remote participant started speaking: mute the mic in this same step.
    MuteNow,
    /// Nothing to apply right now (silence is absorbed by the debounce).
    Hold,
}

/// Half-duplex floor control.
///
/// Muting on agent speech is immediate; missing the start of an utterance
/// risks audible feedback. Unmuting is deferred behind a single cancellable
/// deadline so inter-word pauses don't flap the mic. The deadline is the only
/// timer in the whole session and must be cleared on new speech, disconnect,
/// and reset.
#[derive(Debug)]
pub struct TurnTakingController {
    debounce: Duration,
    agent_speaking: bool,
    unmute_at: Option<Instant>,
}

impl TurnTakingController {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            agent_speaking: false,
            unmute_at: None,
        }
    }

    /// Feeds one speaker-activity update. `remote_speaking` is whether the
    /// reported set contains anyone besides the local participant.
    pub fn on_active_speakers(&mut self, remote_speaking: bool, now: Instant) -> TurnDecision {
        if remote_speaking {
            self.unmute_at = None;
            self.agent_speaking = true;
            TurnDecision::MuteNow
        } else {
            if self.unmute_at.is_none() {
                self.unmute_at = Some(now + self.debounce);
            }
            TurnDecision::Hold
        }
    }

    /// The pending unmute deadline, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.unmute_at
    }

    /// Called when the armed deadline elapses. Returns true if the unmute
    /// should be applied (false when a speaking event superseded it).
    pub fn fire(&mut self) -> bool {
        if self.unmute_at.is_none() {
            return false;
        }
        self.unmute_at = None;
        self.agent_speaking = false;
        true
    }

    pub fn agent_speaking(&self) -> bool {
        self.agent_speaking
    }

    pub fn cancel(&mut self) {
        self.unmute_at = None;
        self.agent_speaking = false;
    }
}

impl Default for TurnTakingController {
    fn default() -> Self {
        Self::new(UNMUTE_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn remote_speech_mutes_immediately_and_cancels_the_deadline() {
        let mut tt = TurnTakingController::default();
        let t0 = Instant::now();

        assert_eq!(tt.on_active_speakers(false, t0), TurnDecision::Hold);
        assert!(tt.deadline().is_some());

        assert_eq!(tt.on_active_speakers(true, t0), TurnDecision::MuteNow);
        assert!(tt.agent_speaking());
        assert!(tt.deadline().is_none(), "speech supersedes a pending unmute");
    }

    #[tokio::test(start_paused = true)]
    async fn silence_arms_one_deadline_at_now_plus_debounce() {
        let mut tt = TurnTakingController::default();
        let t0 = Instant::now();

        tt.on_active_speakers(true, t0);
        tt.on_active_speakers(false, t0);
        assert_eq!(tt.deadline(), Some(t0 + UNMUTE_DEBOUNCE));

        // Repeated silence reports must not push the deadline out.
        tt.on_active_speakers(false, t0 + Duration::from_millis(700));
        assert_eq!(tt.deadline(), Some(t0 + UNMUTE_DEBOUNCE));
    }

    #[tokio::test(start_paused = true)]
    async fn fire_applies_the_unmute_exactly_once() {
        let mut tt = TurnTakingController::default();
        let t0 = Instant::now();

        tt.on_active_speakers(true, t0);
        tt.on_active_speakers(false, t0);

        assert!(tt.fire());
        assert!(!tt.agent_speaking());
        assert!(tt.deadline().is_none());
        assert!(!tt.fire(), "a cleared deadline must not fire again");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_clears_both_flag_and_deadline() {
        let mut tt = TurnTakingController::default();
        let t0 = Instant::now();

        tt.on_active_speakers(true, t0);
        tt.on_active_speakers(false, t0);
        tt.cancel();

        assert!(!tt.agent_speaking());
        assert!(tt.deadline().is_none());
        assert!(!tt.fire());
    }
}
