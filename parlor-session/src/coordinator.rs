use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};

use parlor_core::control::{ControlMessage, decode_control};
use parlor_core::message::{Message, MessageStore, unix_ms};
use parlor_core::session::{ConnectionState, SessionState};
use parlor_core::types::{AgentId, ParticipantIdentity, Role};

use crate::reconcile::{ReconcileContext, SegmentOutcome, ThinkingEffect, reconcile_segment};
use crate::sinks::{AudioSink, SinkRegistry};
use crate::traits::{
    CaptureOptions, MediaTransport, TokenRequest, TokenService, TrackKind, TranscriptionSegment,
    TransportEvent,
};
use crate::turn_taking::{TurnDecision, TurnTakingController, UNMUTE_DEBOUNCE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Backend picks a room when None.
    pub room_name: Option<String>,
    pub participant_name: String,
    pub capture: CaptureOptions,
    pub unmute_debounce: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room_name: None,
            participant_name: "user".into(),
            capture: CaptureOptions::default(),
            unmute_debounce: UNMUTE_DEBOUNCE,
        }
    }
}

/// Rendering-layer actions. Processed strictly in order by the coordinator
/// task, interleaved with transport events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Disconnect,
    Reset,
    End,
    ToggleMic,
    ToggleVoiceOutput,
}

/// Read model published after every coordinator step. The rendering layer
/// only ever sees these; it never touches coordinator internals.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub connection: ConnectionState,
    pub room_name: Option<String>,
    pub active_agent: AgentId,
    pub mic_muted: bool,
    pub agent_speaking: bool,
    pub voice_output_enabled: bool,
    pub thinking: bool,
    pub ended: bool,
    pub last_error: Option<String>,
    pub messages: Vec<Message>,
    pub sinks: Vec<AudioSink>,
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub async fn connect(&self) -> anyhow::Result<()> {
        self.send(Command::Connect).await
    }

    pub async fn disconnect(&self) -> anyhow::Result<()> {
        self.send(Command::Disconnect).await
    }

    pub async fn reset(&self) -> anyhow::Result<()> {
        self.send(Command::Reset).await
    }

    pub async fn end(&self) -> anyhow::Result<()> {
        self.send(Command::End).await
    }

    pub async fn toggle_mic(&self) -> anyhow::Result<()> {
        self.send(Command::ToggleMic).await
    }

    pub async fn toggle_voice_output(&self) -> anyhow::Result<()> {
        self.send(Command::ToggleVoiceOutput).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A watch receiver for callers that want change notifications.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    async fn send(&self, cmd: Command) -> anyhow::Result<()> {
        self.commands
            .send(cmd)
            .await
            .context("session coordinator task stopped")
    }
}

enum Step {
    Command(Option<Command>),
    Event(Option<TransportEvent>),
    UnmuteDue,
}

/// Owns the live connection and folds speaker activity, control messages and
/// transcription into one consistent conversation state.
///
/// Everything runs on a single task: commands, transport events and the
/// deferred unmute share one `select!`, so no handler ever preempts another
/// and every handler reads the latest session flags.
pub struct SessionCoordinator {
    cfg: SessionConfig,
    tokens: Arc<dyn TokenService>,
    transport: Arc<dyn MediaTransport>,

    session: SessionState,
    store: MessageStore,
    turn_taking: TurnTakingController,
    sinks: SinkRegistry,

    // The event stream of the current connection. Dropping it is what
    // unregisters us from a torn-down session.
    events: Option<mpsc::Receiver<TransportEvent>>,
    last_error: Option<String>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionCoordinator {
    /// Spawns the coordinator task and returns the handle the rendering
    /// layer drives it with.
    pub fn spawn(
        cfg: SessionConfig,
        tokens: Arc<dyn TokenService>,
        transport: Arc<dyn MediaTransport>,
    ) -> SessionHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        let turn_taking = TurnTakingController::new(cfg.unmute_debounce);
        let session = SessionState::default();
        let store = MessageStore::new();
        let sinks = SinkRegistry::new();

        let (snapshot_tx, snapshot_rx) = watch::channel(Self::snapshot_of(
            &session, &store, &sinks, &None,
        ));

        let coordinator = Self {
            cfg,
            tokens,
            transport,
            session,
            store,
            turn_taking,
            sinks,
            events: None,
            last_error: None,
            snapshot_tx,
        };
        tokio::spawn(coordinator.run(cmd_rx));

        SessionHandle {
            commands: cmd_tx,
            snapshot: snapshot_rx,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            let deadline = self.turn_taking.deadline();
            let step = {
                let events = self.events.as_mut();
                tokio::select! {
                    cmd = commands.recv() => Step::Command(cmd),
                    ev = next_event(events) => Step::Event(ev),
                    _ = until(deadline) => Step::UnmuteDue,
                }
            };

            match step {
                Step::Command(None) => {
                    // Handle dropped: tear down and stop.
                    self.disconnect().await;
                    self.publish();
                    return;
                }
                Step::Command(Some(cmd)) => self.apply(cmd).await,
                Step::Event(Some(ev)) => self.dispatch(ev).await,
                Step::Event(None) => {
                    // Transport closed its stream without a Disconnected
                    // event; treat it the same.
                    log::info!("transport event stream closed");
                    self.teardown_connection().await;
                }
                Step::UnmuteDue => self.on_unmute_due().await,
            }

            self.publish();
        }
    }

    async fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => self.connect().await,
            Command::Disconnect => self.disconnect().await,
            Command::Reset => self.reset().await,
            Command::End => self.end().await,
            Command::ToggleMic => self.toggle_mic().await,
            Command::ToggleVoiceOutput => self.toggle_voice_output().await,
        }
    }

    async fn connect(&mut self) {
        // Idempotent: a connect already in flight or an established
        // connection makes this a no-op.
        if matches!(
            self.session.connection,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return;
        }
        if self.session.ended {
            log::debug!("ignoring connect on an ended session; reset starts a fresh one");
            return;
        }

        self.session.connection = ConnectionState::Connecting;
        self.publish();

        match self.try_connect().await {
            Ok(()) => {
                self.session.connection = ConnectionState::Connected;
                self.last_error = None;
                log::info!(
                    "connected to room {}",
                    self.session.room_name.as_deref().unwrap_or("<unnamed>")
                );
            }
            Err(e) => {
                // No automatic retry; the user reconnects explicitly.
                log::warn!("connect failed: {e:#}");
                self.last_error = Some(format!("{e:#}"));
                self.events = None;
                self.transport.disconnect().await;
                self.session.connection = ConnectionState::Disconnected;
                self.session.room_name = None;
            }
        }
    }

    async fn try_connect(&mut self) -> anyhow::Result<()> {
        let request = TokenRequest {
            room_name: self.cfg.room_name.clone(),
            participant_name: self.cfg.participant_name.clone(),
        };
        let grant = self
            .tokens
            .issue(&request)
            .await
            .context("token request failed")?;

        let events = self
            .transport
            .connect(&grant.url, &grant.token, &self.cfg.capture)
            .await
            .context("transport connect failed")?;
        self.events = Some(events);

        self.transport
            .set_microphone_enabled(true)
            .await
            .context("microphone enable failed")?;

        self.session.room_name = Some(grant.room_name);
        self.session.mic_muted = false;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.teardown_connection().await;
    }

    /// Shared teardown for explicit disconnects, remote disconnects and
    /// closed event streams. Cancels the unmute deadline before anything
    /// else: a stale timer re-enabling the mic after a new session has
    /// started is a correctness hazard, not a nuisance.
    async fn teardown_connection(&mut self) {
        self.turn_taking.cancel();
        self.events = None;
        self.sinks.clear();
        self.transport.disconnect().await;
        self.session.connection = ConnectionState::Disconnected;
        self.session.room_name = None;
        self.session.agent_speaking = false;
    }

    async fn reset(&mut self) {
        self.disconnect().await;

        // Fresh state and store; the old conversation is gone for good.
        self.session = SessionState::default();
        self.store = MessageStore::new();
        self.turn_taking = TurnTakingController::new(self.cfg.unmute_debounce);
        self.last_error = None;

        self.connect().await;
    }

    async fn end(&mut self) {
        self.session.ended = true;
        self.session.thinking = false;
        self.disconnect().await;
    }

    async fn toggle_mic(&mut self) {
        // Manual mute is rejected while the agent holds the floor.
        if self.session.connection != ConnectionState::Connected
            || self.session.agent_speaking
            || self.session.ended
        {
            return;
        }

        let muted = !self.session.mic_muted;
        if let Err(e) = self.transport.set_microphone_enabled(!muted).await {
            log::warn!("microphone toggle failed: {e:#}");
            return;
        }
        self.session.mic_muted = muted;
    }

    async fn toggle_voice_output(&mut self) {
        if self.session.ended {
            return;
        }
        self.session.voice_output_enabled = !self.session.voice_output_enabled;
        self.sinks.set_all_muted(!self.session.voice_output_enabled);
    }

    async fn dispatch(&mut self, event: TransportEvent) {
        // Events racing a teardown have nothing to mutate.
        if self.session.connection == ConnectionState::Disconnected {
            return;
        }

        match event {
            TransportEvent::TrackSubscribed { kind, participant } => {
                if kind == TrackKind::Audio {
                    self.sinks
                        .attach(participant, !self.session.voice_output_enabled);
                }
            }
            TransportEvent::TrackUnsubscribed { kind, participant } => {
                if kind == TrackKind::Audio {
                    self.sinks.detach(&participant);
                }
            }
            TransportEvent::ActiveSpeakersChanged { speakers } => {
                self.on_active_speakers(&speakers).await;
            }
            TransportEvent::DataReceived { payload } => {
                self.on_data(&payload).await;
            }
            TransportEvent::TranscriptionReceived {
                participant,
                segments,
            } => {
                self.on_transcription(&participant, &segments);
            }
            TransportEvent::Disconnected { reason } => {
                log::info!("transport disconnected: {reason:?}");
                self.teardown_connection().await;
            }
        }
    }

    async fn on_active_speakers(&mut self, speakers: &[ParticipantIdentity]) {
        // With voice output off, agent audio is not rendered and there is no
        // feedback path to protect against.
        if !self.session.voice_output_enabled {
            return;
        }

        let local = self.transport.local_identity();
        let remote_speaking = speakers.iter().any(|s| *s != local);

        match self
            .turn_taking
            .on_active_speakers(remote_speaking, Instant::now())
        {
            TurnDecision::MuteNow => {
                self.session.agent_speaking = true;
                if let Err(e) = self.transport.set_microphone_enabled(false).await {
                    log::warn!("failed to mute for agent speech: {e:#}");
                }
                self.session.mic_muted = true;
            }
            TurnDecision::Hold => {}
        }
    }

    async fn on_unmute_due(&mut self) {
        if !self.turn_taking.fire() {
            return;
        }
        self.session.agent_speaking = false;
        if self.session.connection == ConnectionState::Connected {
            if let Err(e) = self.transport.set_microphone_enabled(true).await {
                log::warn!("failed to re-enable microphone: {e:#}");
            }
        }
        self.session.mic_muted = false;
    }

    async fn on_data(&mut self, payload: &[u8]) {
        let msg = match decode_control(payload) {
            Ok(msg) => msg,
            Err(e) => {
                // Best-effort channel shared with other traffic.
                log::debug!("ignoring data payload ({} bytes): {e}", payload.len());
                return;
            }
        };

        match msg {
            ControlMessage::AgentSwitch { agent } => {
                log::info!("active agent is now {agent}");
                self.session.active_agent = agent;
            }
            ControlMessage::ConversationEnd => {
                log::info!("conversation ended by remote");
                self.session.ended = true;
                self.session.thinking = false;
                self.disconnect().await;
            }
            ControlMessage::AgentResponse { agent, text } => {
                // Fallback path: full agent text delivered instantly while
                // audio rendering (and its incremental transcription) is off.
                if self.session.voice_output_enabled {
                    return;
                }
                self.session.thinking = false;
                let now = unix_ms();
                self.store.upsert(Message {
                    id: format!("agent-instant-{now}"),
                    role: Role::Assistant,
                    agent: Some(agent),
                    content: text,
                    transcribing: false,
                    ts_unix_ms: now,
                });
            }
        }
    }

    fn on_transcription(
        &mut self,
        participant: &ParticipantIdentity,
        segments: &[TranscriptionSegment],
    ) {
        let local = self.transport.local_identity();
        for segment in segments {
            let ctx = ReconcileContext {
                local_identity: &local,
                voice_output_enabled: self.session.voice_output_enabled,
                active_agent: self.session.active_agent,
                now_unix_ms: unix_ms(),
            };
            let reconciled = reconcile_segment(segment, participant, &ctx);

            match reconciled.thinking {
                ThinkingEffect::Set => self.session.thinking = true,
                ThinkingEffect::Clear => self.session.thinking = false,
                ThinkingEffect::Keep => {}
            }
            if let SegmentOutcome::Upsert(message) = reconciled.outcome {
                self.store.upsert(message);
            }
        }
    }

    fn publish(&self) {
        let next = Self::snapshot_of(&self.session, &self.store, &self.sinks, &self.last_error);
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn snapshot_of(
        session: &SessionState,
        store: &MessageStore,
        sinks: &SinkRegistry,
        last_error: &Option<String>,
    ) -> SessionSnapshot {
        SessionSnapshot {
            connection: session.connection,
            room_name: session.room_name.clone(),
            active_agent: session.active_agent,
            mic_muted: session.mic_muted,
            agent_speaking: session.agent_speaking,
            voice_output_enabled: session.voice_output_enabled,
            thinking: session.thinking,
            ended: session.ended,
            last_error: last_error.clone(),
            messages: store.messages().to_vec(),
            sinks: sinks.sinks().to_vec(),
        }
    }
}

async fn next_event(events: Option<&mut mpsc::Receiver<TransportEvent>>) -> Option<TransportEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => sleep_until(d).await,
        None => std::future::pending().await,
    }
}
