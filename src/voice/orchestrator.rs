//! Runs the voice loop against real devices and the tutor service
//!
//! The orchestrator thread owns the [`VoiceLoop`], the capture and output
//! devices, and a forked [`ApiHandle`]. It feeds commands, device events and
//! service replies into the machine, executes the effects it returns, and
//! publishes a [`VoiceSnapshot`] after every step for the UI to render.

use super::playback::{PlaybackSlot, SpeechOutput};
use super::recognizer::SpeechInput;
use super::state::{Ticket, VoiceEffect, VoiceEvent, VoiceLoop, VoiceMode, CAPTURE_UNSUPPORTED};
use super::DeviceEvent;
use crate::api::{ApiHandle, ApiResponse, RequestId, SessionProgress};
use crate::config::VoiceConfig;
use crate::messages::Message;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const TICK: Duration = Duration::from_millis(10);

/// Commands from the UI
#[derive(Clone, Debug, PartialEq)]
pub enum VoiceCommand {
    StartListening,
    Stop,
    Reset,
    SubmitText(String),
    Shutdown,
}

/// Everything the voice view renders
#[derive(Clone, Debug, PartialEq)]
pub struct VoiceSnapshot {
    pub session_id: String,
    pub mode: VoiceMode,
    pub messages: Vec<Message>,
    pub live_text: String,
    pub progress: Option<SessionProgress>,
    pub error: Option<String>,
    pub capture_available: bool,
}

impl VoiceSnapshot {
    pub fn of(machine: &VoiceLoop) -> Self {
        Self {
            session_id: machine.session_id().to_string(),
            mode: machine.mode(),
            messages: machine.transcript().messages().to_vec(),
            live_text: machine.live_text(),
            progress: machine.progress().cloned(),
            error: machine.error().map(str::to_string),
            capture_available: machine.capture_available(),
        }
    }

    /// Progress worth showing: only once a question has been asked
    pub fn visible_progress(&self) -> Option<&SessionProgress> {
        self.progress.as_ref().filter(|p| p.has_activity())
    }
}

/// Latest snapshot, shared between the orchestrator and the UI
#[derive(Clone, Debug)]
pub struct SharedVoiceState {
    inner: Arc<RwLock<VoiceSnapshot>>,
}

impl SharedVoiceState {
    pub fn new(snapshot: VoiceSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Copy of the current snapshot (no lock held after return)
    pub fn snapshot(&self) -> VoiceSnapshot {
        self.inner.read().clone()
    }

    pub fn mode(&self) -> VoiceMode {
        self.inner.read().mode
    }

    pub fn message_count(&self) -> usize {
        self.inner.read().messages.len()
    }

    fn publish(&self, snapshot: VoiceSnapshot) {
        *self.inner.write() = snapshot;
    }
}

/// Capture and output devices used by one voice session
pub struct VoiceDevices {
    /// `None` when speech capture is unavailable
    pub input: Option<Box<dyn SpeechInput>>,
    pub output: Box<dyn SpeechOutput>,
}

impl VoiceDevices {
    /// Default microphone and speakers
    #[cfg(feature = "audio-io")]
    pub fn detect(config: &VoiceConfig, api: &ApiHandle) -> Self {
        use super::recognizer::{MicrophoneInput, SegmenterConfig};
        use super::speech::DeviceOutput;

        let input = match MicrophoneInput::probe(api, SegmenterConfig::from_voice(config)) {
            Ok(input) => Some(Box::new(input) as Box<dyn SpeechInput>),
            Err(e) => {
                warn!("Speech capture unavailable: {}", e);
                None
            }
        };

        Self {
            input,
            output: Box::new(DeviceOutput::detect(config)),
        }
    }

    /// Local synthesis only; capture needs the `audio-io` feature
    #[cfg(not(feature = "audio-io"))]
    pub fn detect(config: &VoiceConfig, _api: &ApiHandle) -> Self {
        Self {
            input: None,
            output: Box::new(super::speech::DeviceOutput::detect(config)),
        }
    }
}

/// UI-side handle to a running orchestrator
#[derive(Clone, Debug)]
pub struct VoiceHandle {
    command_tx: Sender<VoiceCommand>,
    state: SharedVoiceState,
}

impl VoiceHandle {
    pub fn start_listening(&self) {
        self.send(VoiceCommand::StartListening);
    }

    pub fn stop(&self) {
        self.send(VoiceCommand::Stop);
    }

    pub fn reset(&self) {
        self.send(VoiceCommand::Reset);
    }

    pub fn submit_text(&self, text: impl Into<String>) {
        self.send(VoiceCommand::SubmitText(text.into()));
    }

    /// Stop all devices and end the orchestrator thread
    pub fn shutdown(&self) {
        self.send(VoiceCommand::Shutdown);
    }

    pub fn snapshot(&self) -> VoiceSnapshot {
        self.state.snapshot()
    }

    pub fn state(&self) -> &SharedVoiceState {
        &self.state
    }

    fn send(&self, command: VoiceCommand) {
        if let Err(e) = self.command_tx.send(command) {
            debug!("Voice orchestrator gone, dropped {:?}", e.into_inner());
        }
    }
}

/// Owns the voice loop and its devices on a dedicated thread
pub struct VoiceOrchestrator {
    machine: VoiceLoop,
    api: ApiHandle,
    devices: VoiceDevices,
    slot: PlaybackSlot,
    tickets: HashMap<RequestId, Ticket>,
    state: SharedVoiceState,
    command_rx: Receiver<VoiceCommand>,
    device_tx: Sender<DeviceEvent>,
    device_rx: Receiver<DeviceEvent>,
}

impl VoiceOrchestrator {
    /// Create an orchestrator for one voice session
    ///
    /// Returns both the handle (for the UI) and the orchestrator (to be
    /// started in a separate thread).
    pub fn new(
        config: &VoiceConfig,
        session_id: impl Into<String>,
        api: ApiHandle,
        devices: VoiceDevices,
    ) -> (VoiceHandle, Self) {
        let machine = VoiceLoop::new(session_id, config, devices.input.is_some());
        let state = SharedVoiceState::new(VoiceSnapshot::of(&machine));
        let (command_tx, command_rx) = unbounded();
        let (device_tx, device_rx) = unbounded();

        let handle = VoiceHandle {
            command_tx,
            state: state.clone(),
        };
        let orchestrator = Self {
            machine,
            api,
            devices,
            slot: PlaybackSlot::new(),
            tickets: HashMap::new(),
            state,
            command_rx,
            device_tx,
            device_rx,
        };

        (handle, orchestrator)
    }

    /// Start the orchestrator thread
    pub fn start(self) -> JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    fn run(mut self) {
        info!("Voice session {} started", self.machine.session_id());

        let command_rx = self.command_rx.clone();
        let device_rx = self.device_rx.clone();
        let reply_rx = self.api.replies().clone();

        self.dispatch(VoiceEvent::Opened);

        loop {
            select! {
                recv(command_rx) -> cmd => match cmd {
                    Ok(VoiceCommand::StartListening) => self.dispatch(VoiceEvent::StartRequested),
                    Ok(VoiceCommand::Stop) => self.dispatch(VoiceEvent::StopRequested),
                    Ok(VoiceCommand::Reset) => self.dispatch(VoiceEvent::ResetRequested),
                    Ok(VoiceCommand::SubmitText(text)) => {
                        self.dispatch(VoiceEvent::TextSubmitted(text))
                    }
                    Ok(VoiceCommand::Shutdown) => {
                        info!("Voice session shutdown requested");
                        break;
                    }
                    Err(_) => {
                        warn!("Voice command channel disconnected");
                        break;
                    }
                },
                recv(device_rx) -> event => {
                    if let Ok(event) = event {
                        self.on_device(event);
                    }
                },
                recv(reply_rx) -> reply => {
                    if let Ok(response) = reply {
                        self.on_response(response);
                    }
                },
                default(TICK) => {}
            }

            let effects = self.machine.poll_timers(Instant::now());
            if !effects.is_empty() {
                self.apply(effects);
            }
        }

        self.slot.stop();
        if let Some(input) = self.devices.input.as_mut() {
            input.stop();
        }
        info!("Voice session {} ended", self.machine.session_id());
    }

    fn on_device(&mut self, event: DeviceEvent) {
        if let DeviceEvent::PlaybackFinished(token) | DeviceEvent::PlaybackFailed(token, _) =
            &event
        {
            self.slot.finished(*token);
        }
        self.dispatch(event.into());
    }

    fn on_response(&mut self, response: ApiResponse) {
        match self.tickets.remove(&response.id) {
            Some(ticket) => self.dispatch(VoiceEvent::Reply {
                ticket,
                result: response.result,
            }),
            None => debug!("Reply {} has no ticket", response.id),
        }
    }

    fn dispatch(&mut self, event: VoiceEvent) {
        let effects = self.machine.handle(event, Instant::now());
        self.apply(effects);
    }

    /// Execute effects, feeding the device events they cause back in
    fn apply(&mut self, effects: Vec<VoiceEffect>) {
        let mut queue = VecDeque::from(self.execute_all(effects));
        while let Some(event) = queue.pop_front() {
            let effects = self.machine.handle(event.into(), Instant::now());
            queue.extend(self.execute_all(effects));
        }
        self.publish();
    }

    fn execute_all(&mut self, effects: Vec<VoiceEffect>) -> Vec<DeviceEvent> {
        effects
            .into_iter()
            .filter_map(|effect| self.execute(effect))
            .collect()
    }

    fn execute(&mut self, effect: VoiceEffect) -> Option<DeviceEvent> {
        match effect {
            VoiceEffect::StartCapture => match self.devices.input.as_mut() {
                Some(input) => match input.start(self.device_tx.clone()) {
                    Ok(()) => None,
                    Err(e) => {
                        warn!("Failed to start capture: {}", e);
                        Some(DeviceEvent::CaptureError(e.user_message()))
                    }
                },
                None => Some(DeviceEvent::CaptureError(CAPTURE_UNSUPPORTED.to_string())),
            },
            VoiceEffect::StopCapture => {
                if let Some(input) = self.devices.input.as_mut() {
                    input.stop();
                }
                Some(DeviceEvent::CaptureEnded)
            }
            VoiceEffect::Request { ticket, call } => {
                let id = self.api.submit(call);
                self.tickets.insert(id, ticket);
                None
            }
            VoiceEffect::PlayAudio { token, audio } => {
                let output = &mut self.devices.output;
                let events = self.device_tx.clone();
                self.slot
                    .start(token, || output.play_audio(token, audio, events))
                    .err()
                    .map(|e| DeviceEvent::PlaybackFailed(token, e.to_string()))
            }
            VoiceEffect::Speak { token, text } => {
                let output = &mut self.devices.output;
                let events = self.device_tx.clone();
                self.slot
                    .start(token, || output.speak(token, &text, events))
                    .err()
                    .map(|e| DeviceEvent::PlaybackFailed(token, e.to_string()))
            }
            VoiceEffect::StopPlayback => {
                self.slot.stop();
                None
            }
        }
    }

    fn publish(&self) {
        self.state.publish(VoiceSnapshot::of(&self.machine));
    }
}
