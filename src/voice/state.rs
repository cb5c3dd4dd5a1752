//! The voice interaction loop as a pure state machine
//!
//! [`VoiceLoop`] coordinates speech capture, the tutor service and speech
//! output so that at most one of them drives at a time and the microphone
//! never hears the tutor. It performs no I/O: every input arrives as a
//! [`VoiceEvent`] with the current time, and every side effect is returned as
//! a [`VoiceEffect`] for the caller to execute.
//!
//! ```text
//! Idle ──start──▶ Listening ──silence──▶ ProcessingAudio ──capture ended──▶ Loading
//!  ▲                  │                        │                              │
//!  │                  └──stop/cancel──▶ Idle   └──────────reply────────────┬──┘
//!  │                                                                       ▼
//!  └──── stop/reset ◀── Speaking ──playback ends + settle delay──▶ Listening
//! ```

use super::router::route_utterance;
use super::{DeviceEvent, PlaybackToken};
use crate::api::{ApiCall, ApiReply, SessionProgress};
use crate::config::VoiceConfig;
use crate::messages::{Message, Transcript};
use crate::{DocTutorError, Result};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Shown when the system has no usable speech capture
pub const CAPTURE_UNSUPPORTED: &str = "Speech recognition is not supported on this system.";

/// Fallback assistant turn when the service gives no detail
pub const TUTOR_ERROR_MESSAGE: &str = "Error communicating with tutor";

/// Which capability is currently driving the loop
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceMode {
    /// Nothing active
    #[default]
    Idle,
    /// Microphone capturing, transcript accumulating
    Listening,
    /// Utterance sent, capture being torn down
    ProcessingAudio,
    /// Waiting for the tutor's reply
    Loading,
    /// Tutor reply being synthesized or played
    Speaking,
}

impl VoiceMode {
    pub fn is_idle(&self) -> bool {
        matches!(self, VoiceMode::Idle)
    }

    pub fn is_listening(&self) -> bool {
        matches!(self, VoiceMode::Listening)
    }

    /// A request is in flight
    pub fn is_loading(&self) -> bool {
        matches!(self, VoiceMode::ProcessingAudio | VoiceMode::Loading)
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self, VoiceMode::Speaking)
    }

    /// Status headline
    pub fn title(&self) -> &'static str {
        match self {
            VoiceMode::Idle => "Ready",
            VoiceMode::Listening => "Listening",
            VoiceMode::ProcessingAudio | VoiceMode::Loading => "Processing",
            VoiceMode::Speaking => "Speaking",
        }
    }

    /// Status hint under the headline
    pub fn hint(&self) -> &'static str {
        match self {
            VoiceMode::Idle => "Press the button to begin",
            VoiceMode::Listening => "Speak naturally",
            VoiceMode::ProcessingAudio | VoiceMode::Loading => "Analyzing your input",
            VoiceMode::Speaking => "AI is responding",
        }
    }
}

impl std::fmt::Display for VoiceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceMode::Idle => write!(f, "Idle"),
            VoiceMode::Listening => write!(f, "Listening"),
            VoiceMode::ProcessingAudio => write!(f, "ProcessingAudio"),
            VoiceMode::Loading => write!(f, "Loading"),
            VoiceMode::Speaking => write!(f, "Speaking"),
        }
    }
}

/// Correlates a service request with its reply inside the machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

/// Inputs to the machine
#[derive(Clone, Debug)]
pub enum VoiceEvent {
    /// Open the session: greet and fetch progress
    Opened,
    /// User pressed start
    StartRequested,
    /// User pressed stop
    StopRequested,
    /// User pressed reset
    ResetRequested,
    /// User typed a message
    TextSubmitted(String),
    /// Something from the capture or output device
    Device(DeviceEvent),
    /// A service request finished
    Reply {
        ticket: Ticket,
        result: Result<ApiReply>,
    },
}

impl From<DeviceEvent> for VoiceEvent {
    fn from(event: DeviceEvent) -> Self {
        VoiceEvent::Device(event)
    }
}

/// Side effects for the caller to execute, in order
#[derive(Clone, Debug, PartialEq)]
pub enum VoiceEffect {
    StartCapture,
    StopCapture,
    Request { ticket: Ticket, call: ApiCall },
    PlayAudio { token: PlaybackToken, audio: Vec<u8> },
    Speak { token: PlaybackToken, text: String },
    StopPlayback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputKind {
    Audio,
    Speech,
}

#[derive(Clone, Debug)]
struct ActiveOutput {
    token: PlaybackToken,
    kind: OutputKind,
    text: String,
}

/// The voice loop state machine
#[derive(Clone, Debug)]
pub struct VoiceLoop {
    session_id: String,
    greeting: String,
    silence_timeout: Duration,
    resume_delay: Duration,
    capture_available: bool,

    mode: VoiceMode,
    transcript: Transcript,
    progress: Option<SessionProgress>,
    error: Option<String>,

    /// Finalized fragments, each followed by a space
    final_text: String,
    interim_text: String,
    /// Captured speech still being transcribed
    pending_transcriptions: u32,
    silence_deadline: Option<Instant>,
    resume_deadline: Option<Instant>,

    utterance: Option<Ticket>,
    synthesis: Option<(Ticket, String)>,
    output: Option<ActiveOutput>,
    reset: Option<Ticket>,

    next_ticket: u64,
    next_token: u64,
}

impl VoiceLoop {
    pub fn new(
        session_id: impl Into<String>,
        config: &VoiceConfig,
        capture_available: bool,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            greeting: config.greeting.clone(),
            silence_timeout: config.silence_timeout(),
            resume_delay: config.resume_delay(),
            capture_available,
            mode: VoiceMode::Idle,
            transcript: Transcript::new(),
            progress: None,
            error: (!capture_available).then(|| CAPTURE_UNSUPPORTED.to_string()),
            final_text: String::new(),
            interim_text: String::new(),
            pending_transcriptions: 0,
            silence_deadline: None,
            resume_deadline: None,
            utterance: None,
            synthesis: None,
            output: None,
            reset: None,
            next_ticket: 0,
            next_token: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn mode(&self) -> VoiceMode {
        self.mode
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn progress(&self) -> Option<&SessionProgress> {
        self.progress.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn capture_available(&self) -> bool {
        self.capture_available
    }

    /// What has been heard so far in this listening turn
    pub fn live_text(&self) -> String {
        format!("{}{}", self.final_text, self.interim_text)
    }

    /// A conversational request is outstanding
    pub fn has_request_in_flight(&self) -> bool {
        self.utterance.is_some()
    }

    pub fn silence_deadline(&self) -> Option<Instant> {
        self.silence_deadline
    }

    pub fn resume_deadline(&self) -> Option<Instant> {
        self.resume_deadline
    }

    /// Earliest pending timer
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.silence_deadline, self.resume_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Feed one event
    pub fn handle(&mut self, event: VoiceEvent, now: Instant) -> Vec<VoiceEffect> {
        let mut effects = Vec::new();

        match event {
            VoiceEvent::Opened => self.open(&mut effects),
            VoiceEvent::StartRequested => self.start_listening(&mut effects),
            VoiceEvent::StopRequested => {
                info!("Voice loop stopped by user");
                self.halt(&mut effects);
            }
            VoiceEvent::ResetRequested => self.reset(&mut effects),
            VoiceEvent::TextSubmitted(text) => self.submit(text.trim(), &mut effects),
            VoiceEvent::Device(device) => self.on_device(device, now, &mut effects),
            VoiceEvent::Reply { ticket, result } => self.on_reply(ticket, result, &mut effects),
        }

        effects
    }

    /// Fire any timers due at `now`
    pub fn poll_timers(&mut self, now: Instant) -> Vec<VoiceEffect> {
        let mut effects = Vec::new();

        if self.silence_deadline.is_some_and(|deadline| deadline <= now) {
            self.silence_deadline = None;
            if self.mode.is_listening() && self.pending_transcriptions > 0 {
                // Re-armed when the transcription settles
                debug!("Silence with {} transcriptions pending", self.pending_transcriptions);
            } else if self.mode.is_listening() {
                let text = self.final_text.trim().to_string();
                if text.is_empty() {
                    debug!("Silence with no finalized speech, still listening");
                } else {
                    debug!("Silence elapsed, submitting {} chars", text.len());
                    self.submit(&text, &mut effects);
                }
            }
        }

        if self.resume_deadline.is_some_and(|deadline| deadline <= now) {
            self.resume_deadline = None;
            if self.mode.is_idle() {
                debug!("Settle delay over, listening again");
                self.start_listening(&mut effects);
            }
        }

        effects
    }

    fn ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    fn token(&mut self) -> PlaybackToken {
        self.next_token += 1;
        PlaybackToken(self.next_token)
    }

    fn set_mode(&mut self, mode: VoiceMode) {
        if self.mode != mode {
            debug!("Voice loop {} -> {}", self.mode, mode);
            self.mode = mode;
        }
    }

    fn open(&mut self, effects: &mut Vec<VoiceEffect>) {
        let greeting = self.greeting.clone();
        self.transcript.push(Message::assistant(greeting.clone()));
        self.speak(greeting, effects);
        self.fetch_progress(effects);
    }

    fn fetch_progress(&mut self, effects: &mut Vec<VoiceEffect>) {
        let ticket = self.ticket();
        effects.push(VoiceEffect::Request {
            ticket,
            call: ApiCall::Progress {
                session_id: self.session_id.clone(),
            },
        });
    }

    fn start_listening(&mut self, effects: &mut Vec<VoiceEffect>) {
        if !self.capture_available {
            debug!("Start ignored, no speech capture");
            return;
        }
        if !self.mode.is_idle() {
            warn!("Start ignored while {}", self.mode);
            return;
        }

        self.resume_deadline = None;
        self.silence_deadline = None;
        self.final_text.clear();
        self.interim_text.clear();
        self.pending_transcriptions = 0;
        self.set_mode(VoiceMode::Listening);
        effects.push(VoiceEffect::StartCapture);
    }

    /// Cancel whatever is active and go idle
    ///
    /// A request already sent keeps running, but its reply is no longer
    /// tracked and will be discarded.
    fn halt(&mut self, effects: &mut Vec<VoiceEffect>) {
        if matches!(self.mode, VoiceMode::Listening | VoiceMode::ProcessingAudio) {
            effects.push(VoiceEffect::StopCapture);
        }
        if self.output.is_some() || self.synthesis.is_some() {
            effects.push(VoiceEffect::StopPlayback);
        }

        self.silence_deadline = None;
        self.resume_deadline = None;
        self.final_text.clear();
        self.interim_text.clear();
        self.pending_transcriptions = 0;
        if let Some(ticket) = self.utterance.take() {
            debug!("Request {:?} left in flight, reply will be discarded", ticket);
        }
        self.synthesis = None;
        self.output = None;
        self.set_mode(VoiceMode::Idle);
    }

    fn reset(&mut self, effects: &mut Vec<VoiceEffect>) {
        info!("Resetting voice session {}", self.session_id);
        self.halt(effects);
        self.transcript.clear();

        let ticket = self.ticket();
        self.reset = Some(ticket);
        effects.push(VoiceEffect::Request {
            ticket,
            call: ApiCall::ResetSession {
                session_id: self.session_id.clone(),
            },
        });
    }

    fn submit(&mut self, text: &str, effects: &mut Vec<VoiceEffect>) {
        if text.is_empty() {
            return;
        }
        if self.utterance.is_some() {
            warn!("Submission ignored, a request is already in flight");
            return;
        }

        let spoken = self.mode.is_listening();
        if spoken {
            effects.push(VoiceEffect::StopCapture);
        }
        if self.output.is_some() || self.synthesis.is_some() {
            effects.push(VoiceEffect::StopPlayback);
            self.output = None;
            self.synthesis = None;
        }
        self.silence_deadline = None;
        self.resume_deadline = None;
        self.final_text.clear();
        self.interim_text.clear();
        self.pending_transcriptions = 0;

        self.transcript.push(Message::user(text));
        let call = route_utterance(text).into_call(&self.session_id);
        let ticket = self.ticket();
        debug!("Dispatching {} as {:?}", call.name(), ticket);
        self.utterance = Some(ticket);
        effects.push(VoiceEffect::Request { ticket, call });

        self.set_mode(if spoken {
            VoiceMode::ProcessingAudio
        } else {
            VoiceMode::Loading
        });
    }

    fn speak(&mut self, text: String, effects: &mut Vec<VoiceEffect>) {
        if self.output.take().is_some() {
            effects.push(VoiceEffect::StopPlayback);
        }
        let ticket = self.ticket();
        self.synthesis = Some((ticket, text.clone()));
        self.set_mode(VoiceMode::Speaking);
        effects.push(VoiceEffect::Request {
            ticket,
            call: ApiCall::Synthesize { text },
        });
    }

    /// Start output: server audio when present, local speech otherwise
    fn play(&mut self, text: String, audio: Option<Vec<u8>>, effects: &mut Vec<VoiceEffect>) {
        let token = self.token();
        let (kind, effect) = match audio {
            Some(audio) => (OutputKind::Audio, VoiceEffect::PlayAudio { token, audio }),
            None => (
                OutputKind::Speech,
                VoiceEffect::Speak {
                    token,
                    text: text.clone(),
                },
            ),
        };
        self.output = Some(ActiveOutput { token, kind, text });
        effects.push(effect);
    }

    fn playback_done(&mut self, now: Instant) {
        self.output = None;
        self.set_mode(VoiceMode::Idle);
        self.resume_deadline = Some(now + self.resume_delay);
    }

    fn on_device(&mut self, event: DeviceEvent, now: Instant, effects: &mut Vec<VoiceEffect>) {
        match event {
            DeviceEvent::Fragment { text, is_final } => {
                if !self.mode.is_listening() {
                    debug!("Fragment ignored while {}", self.mode);
                    return;
                }
                if is_final {
                    self.final_text.push_str(&text);
                    self.final_text.push(' ');
                    self.interim_text.clear();
                } else {
                    self.interim_text = text;
                }
                self.silence_deadline = Some(now + self.silence_timeout);
            }
            DeviceEvent::SpeechActivity => {
                if self.mode.is_listening() {
                    self.silence_deadline = Some(now + self.silence_timeout);
                }
            }
            DeviceEvent::TranscriptionPending => {
                if self.mode.is_listening() {
                    self.pending_transcriptions += 1;
                    self.silence_deadline = Some(now + self.silence_timeout);
                }
            }
            DeviceEvent::TranscriptionSettled => {
                if self.mode.is_listening() && self.pending_transcriptions > 0 {
                    self.pending_transcriptions -= 1;
                    self.silence_deadline = Some(now + self.silence_timeout);
                }
            }
            DeviceEvent::CaptureEnded => match self.mode {
                VoiceMode::Listening => {
                    debug!("Capture ended while listening");
                    self.silence_deadline = None;
                    self.final_text.clear();
                    self.interim_text.clear();
                    self.pending_transcriptions = 0;
                    self.set_mode(VoiceMode::Idle);
                }
                VoiceMode::ProcessingAudio => self.set_mode(VoiceMode::Loading),
                _ => {}
            },
            DeviceEvent::CaptureError(message) => {
                warn!("Capture error: {}", message);
                self.error = Some(message);
                if matches!(self.mode, VoiceMode::Listening) {
                    effects.push(VoiceEffect::StopCapture);
                    self.silence_deadline = None;
                    self.pending_transcriptions = 0;
                    self.set_mode(VoiceMode::Idle);
                }
            }
            DeviceEvent::PlaybackFinished(token) => {
                if self.output.as_ref().map(|o| o.token) != Some(token) {
                    debug!("Ignoring finish of stale playback {}", token);
                    return;
                }
                self.playback_done(now);
            }
            DeviceEvent::PlaybackFailed(token, message) => {
                let Some(active) = self.output.clone().filter(|o| o.token == token) else {
                    debug!("Ignoring failure of stale playback {}", token);
                    return;
                };
                warn!("Playback {} failed: {}", token, message);
                match active.kind {
                    OutputKind::Audio => self.play(active.text, None, effects),
                    OutputKind::Speech => self.playback_done(now),
                }
            }
        }
    }

    fn on_reply(
        &mut self,
        ticket: Ticket,
        result: Result<ApiReply>,
        effects: &mut Vec<VoiceEffect>,
    ) {
        if self.utterance == Some(ticket) {
            self.utterance = None;
            self.on_tutor_reply(result, effects);
            return;
        }

        if let Some((pending, text)) = self.synthesis.clone() {
            if pending == ticket {
                self.synthesis = None;
                if !self.mode.is_speaking() {
                    return;
                }
                match result {
                    Ok(ApiReply::Speech(audio)) => self.play(text, audio, effects),
                    Ok(other) => {
                        warn!("Unexpected reply to synthesis: {:?}", other);
                        self.play(text, None, effects);
                    }
                    Err(e) => {
                        debug!("Synthesis failed, using local speech: {}", e);
                        self.play(text, None, effects);
                    }
                }
                return;
            }
        }

        if self.reset == Some(ticket) {
            self.reset = None;
            if let Err(e) = &result {
                warn!("Session reset failed: {}", e);
            }
            self.fetch_progress(effects);
            return;
        }

        // Progress fetches and replies that are no longer awaited
        match result {
            Ok(ApiReply::Progress(progress)) => self.progress = Some(progress),
            Ok(ApiReply::Turn(turn)) => {
                debug!("Discarding stale tutor reply {:?}", ticket);
                if let Some(info) = turn.session_info {
                    self.progress = Some(info);
                }
            }
            Ok(_) => debug!("Discarding stale reply {:?}", ticket),
            Err(e) => debug!("Untracked request {:?} failed: {}", ticket, e),
        }
    }

    fn on_tutor_reply(&mut self, result: Result<ApiReply>, effects: &mut Vec<VoiceEffect>) {
        if self.mode == VoiceMode::ProcessingAudio {
            // Reply beat the capture teardown notice
            self.set_mode(VoiceMode::Loading);
        }

        match result {
            Ok(ApiReply::Turn(turn)) => {
                if let Some(info) = turn.session_info {
                    self.progress = Some(info);
                }
                self.transcript.push(Message::assistant(turn.text.clone()));
                self.speak(turn.text, effects);
            }
            Ok(other) => {
                warn!("Unexpected reply to tutor request: {:?}", other);
                self.tutor_failed(DocTutorError::Decode("unexpected reply".into()));
            }
            Err(e) => self.tutor_failed(e),
        }
    }

    fn tutor_failed(&mut self, error: DocTutorError) {
        warn!("Tutor request failed: {}", error);
        let text = error.detail().unwrap_or(TUTOR_ERROR_MESSAGE).to_string();
        self.transcript.push(Message::error(text));
        self.set_mode(VoiceMode::Idle);
    }
}
