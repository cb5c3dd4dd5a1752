//! Voice orchestrator tests with scripted devices and service
//!
//! The capture and output devices are fakes that record what the
//! orchestrator asks of them; the service is a detached API handle whose
//! requests are answered by the test.

use crossbeam_channel::{Receiver, Sender};
use doctutor::api::{ApiCall, ApiHandle, ApiReply, ApiRequest, SessionProgress, TutorTurn};
use doctutor::config::VoiceConfig;
use doctutor::messages::Role;
use doctutor::voice::{
    ActivePlayback, DeviceEvent, PlaybackToken, SpeechInput, SpeechOutput, VoiceDevices,
    VoiceHandle, VoiceMode, VoiceOrchestrator,
};
use doctutor::{DocTutorError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const SESSION: &str = "session_test";
const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct InputLog {
    fail_start: bool,
    events: Option<Sender<DeviceEvent>>,
    starts: usize,
    stops: usize,
}

struct FakeInput(Arc<Mutex<InputLog>>);

impl SpeechInput for FakeInput {
    fn start(&mut self, events: Sender<DeviceEvent>) -> Result<()> {
        let mut log = self.0.lock();
        log.starts += 1;
        if log.fail_start {
            return Err(DocTutorError::AudioDeviceError("device busy".into()));
        }
        log.events = Some(events);
        Ok(())
    }

    fn stop(&mut self) {
        let mut log = self.0.lock();
        log.stops += 1;
        log.events = None;
    }
}

#[derive(Default)]
struct OutputLog {
    played: Vec<String>,
    current: Option<(PlaybackToken, Sender<DeviceEvent>)>,
    stopped: usize,
}

struct FakeOutput(Arc<Mutex<OutputLog>>);

struct FakePlayback(Arc<Mutex<OutputLog>>);

impl ActivePlayback for FakePlayback {
    fn stop(&mut self) {
        self.0.lock().stopped += 1;
    }
}

impl SpeechOutput for FakeOutput {
    fn play_audio(
        &mut self,
        token: PlaybackToken,
        audio: Vec<u8>,
        events: Sender<DeviceEvent>,
    ) -> Result<Box<dyn ActivePlayback>> {
        let mut log = self.0.lock();
        log.played.push(format!("audio:{}", audio.len()));
        log.current = Some((token, events));
        Ok(Box::new(FakePlayback(Arc::clone(&self.0))))
    }

    fn speak(
        &mut self,
        token: PlaybackToken,
        text: &str,
        events: Sender<DeviceEvent>,
    ) -> Result<Box<dyn ActivePlayback>> {
        let mut log = self.0.lock();
        log.played.push(format!("speak:{}", text));
        log.current = Some((token, events));
        Ok(Box::new(FakePlayback(Arc::clone(&self.0))))
    }
}

struct Rig {
    handle: VoiceHandle,
    thread: Option<JoinHandle<()>>,
    requests: Receiver<ApiRequest>,
    input: Arc<Mutex<InputLog>>,
    output: Arc<Mutex<OutputLog>>,
}

impl Rig {
    fn start() -> Self {
        Self::with_input(InputLog::default())
    }

    fn with_input(input: InputLog) -> Self {
        let config = VoiceConfig {
            silence_timeout_ms: 100,
            resume_delay_ms: 50,
            greeting: "Hi, what shall we study?".into(),
            ..VoiceConfig::default()
        };
        let (api, requests) = ApiHandle::detached();
        let input = Arc::new(Mutex::new(input));
        let output = Arc::new(Mutex::new(OutputLog::default()));
        let devices = VoiceDevices {
            input: Some(Box::new(FakeInput(Arc::clone(&input)))),
            output: Box::new(FakeOutput(Arc::clone(&output))),
        };

        let (handle, orchestrator) = VoiceOrchestrator::new(&config, SESSION, api, devices);
        let thread = Some(orchestrator.start());

        Self {
            handle,
            thread,
            requests,
            input,
            output,
        }
    }

    fn next_request(&self) -> ApiRequest {
        self.requests.recv_timeout(WAIT).expect("no request")
    }

    /// Answer the greeting's synthesis with no audio and its progress fetch
    fn open(&self) {
        let synth = self.next_request();
        assert_eq!(
            synth.call,
            ApiCall::Synthesize {
                text: "Hi, what shall we study?".into()
            }
        );
        synth.respond(Ok(ApiReply::Speech(None)));

        let progress = self.next_request();
        assert_eq!(
            progress.call,
            ApiCall::Progress {
                session_id: SESSION.into()
            }
        );
        progress.respond(Ok(ApiReply::Progress(SessionProgress {
            session_id: SESSION.into(),
            ..Default::default()
        })));

        wait_for(|| self.output.lock().current.is_some());
    }

    fn finish_playback(&self) {
        let (token, events) = self.output.lock().current.take().expect("nothing playing");
        events.send(DeviceEvent::PlaybackFinished(token)).unwrap();
    }

    fn hear(&self, text: &str) {
        let events = self.input.lock().events.clone().expect("not capturing");
        events
            .send(DeviceEvent::Fragment {
                text: text.into(),
                is_final: true,
            })
            .unwrap();
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        self.handle.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_greeting_spoken_then_listening() {
    let rig = Rig::start();
    rig.open();

    assert_eq!(rig.output.lock().played, vec!["speak:Hi, what shall we study?"]);
    assert_eq!(rig.handle.snapshot().mode, VoiceMode::Speaking);
    assert_eq!(rig.handle.state().message_count(), 1);

    rig.finish_playback();
    wait_for(|| rig.handle.state().mode() == VoiceMode::Listening);
    assert_eq!(rig.input.lock().starts, 1);
}

#[test]
fn test_full_turn_resumes_listening() {
    let rig = Rig::start();
    rig.open();
    rig.finish_playback();
    wait_for(|| rig.input.lock().events.is_some());

    rig.hear("what is osmosis");
    let chat = rig.next_request();
    assert_eq!(
        chat.call,
        ApiCall::ConversationChat {
            session_id: SESSION.into(),
            message: "what is osmosis".into(),
        }
    );
    wait_for(|| rig.handle.state().mode() == VoiceMode::Loading);
    assert_eq!(rig.input.lock().stops, 1);

    chat.respond(Ok(ApiReply::Turn(TutorTurn {
        text: "Water moves across a membrane.".into(),
        session_info: Some(SessionProgress {
            session_id: SESSION.into(),
            current_topic: Some("cells".into()),
            questions_asked: 1,
            correct_answers: 1,
            accuracy: 100.0,
        }),
    })));

    let synth = rig.next_request();
    assert_eq!(
        synth.call,
        ApiCall::Synthesize {
            text: "Water moves across a membrane.".into()
        }
    );
    synth.respond(Ok(ApiReply::Speech(Some(vec![0u8; 64]))));
    wait_for(|| rig.output.lock().current.is_some());
    assert_eq!(rig.output.lock().played.last().map(String::as_str), Some("audio:64"));

    let snapshot = rig.handle.snapshot();
    assert_eq!(snapshot.mode, VoiceMode::Speaking);
    assert_eq!(snapshot.messages.len(), 3);
    assert_eq!(snapshot.messages[1].role, Role::User);
    assert_eq!(snapshot.visible_progress().map(|p| p.questions_asked), Some(1));

    rig.finish_playback();
    wait_for(|| rig.input.lock().starts == 2);
    assert_eq!(rig.handle.state().mode(), VoiceMode::Listening);
}

#[test]
fn test_quiz_request_while_listening() {
    let rig = Rig::start();
    rig.open();
    rig.finish_playback();
    wait_for(|| rig.input.lock().events.is_some());

    rig.hear("quiz me");
    let request = rig.next_request();
    assert_eq!(
        request.call,
        ApiCall::ConversationQuestion {
            session_id: SESSION.into(),
            topic: None,
        }
    );
}

#[test]
fn test_stop_goes_idle_and_stays_idle() {
    let rig = Rig::start();
    rig.open();
    rig.finish_playback();
    wait_for(|| rig.handle.state().mode() == VoiceMode::Listening);

    rig.handle.stop();
    wait_for(|| rig.handle.state().mode() == VoiceMode::Idle);
    assert_eq!(rig.input.lock().stops, 1);

    thread::sleep(Duration::from_millis(200));
    assert_eq!(rig.handle.state().mode(), VoiceMode::Idle);
    assert_eq!(rig.input.lock().starts, 1);
}

#[test]
fn test_stop_while_speaking_stops_output() {
    let rig = Rig::start();
    rig.open();

    rig.handle.stop();
    wait_for(|| rig.handle.state().mode() == VoiceMode::Idle);
    assert_eq!(rig.output.lock().stopped, 1);

    // A late finish from the stopped output does not re-arm capture
    rig.finish_playback();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(rig.input.lock().starts, 0);
}

#[test]
fn test_typed_message_while_idle() {
    let rig = Rig::start();
    rig.open();
    rig.handle.stop();
    wait_for(|| rig.handle.state().mode() == VoiceMode::Idle);

    rig.handle.submit_text("  explain diffusion  ");
    let request = rig.next_request();
    assert_eq!(
        request.call,
        ApiCall::ConversationChat {
            session_id: SESSION.into(),
            message: "explain diffusion".into(),
        }
    );
    wait_for(|| rig.handle.state().mode() == VoiceMode::Loading);
}

#[test]
fn test_reset_clears_transcript_and_refetches_progress() {
    let rig = Rig::start();
    rig.open();
    rig.handle.stop();
    wait_for(|| rig.handle.state().mode() == VoiceMode::Idle);

    rig.handle.reset();
    let reset = rig.next_request();
    assert_eq!(
        reset.call,
        ApiCall::ResetSession {
            session_id: SESSION.into()
        }
    );
    wait_for(|| rig.handle.state().message_count() == 0);

    reset.respond(Ok(ApiReply::SessionReset));
    let progress = rig.next_request();
    assert_eq!(
        progress.call,
        ApiCall::Progress {
            session_id: SESSION.into()
        }
    );
    progress.respond(Ok(ApiReply::Progress(SessionProgress {
        session_id: SESSION.into(),
        ..Default::default()
    })));

    assert!(rig.requests.recv_timeout(Duration::from_millis(200)).is_err());
    assert_eq!(rig.handle.state().message_count(), 0);
}

#[test]
fn test_shutdown_stops_devices() {
    let mut rig = Rig::start();
    rig.open();
    rig.finish_playback();
    wait_for(|| rig.handle.state().mode() == VoiceMode::Listening);

    rig.handle.shutdown();
    if let Some(thread) = rig.thread.take() {
        thread.join().unwrap();
    }
    assert_eq!(rig.input.lock().stops, 1);
}

#[test]
fn test_silence_submission_reaches_loading_before_reply() {
    let rig = Rig::start();
    rig.open();
    rig.finish_playback();
    wait_for(|| rig.input.lock().events.is_some());

    rig.hear("define entropy");
    let _chat = rig.next_request();

    // Capture teardown alone moves the loop on; the reply is still pending
    wait_for(|| rig.handle.state().mode() == VoiceMode::Loading);
    assert!(rig.input.lock().events.is_none());
}

#[test]
fn test_failed_resume_returns_to_idle_with_error() {
    let rig = Rig::with_input(InputLog {
        fail_start: true,
        ..InputLog::default()
    });
    rig.open();
    rig.finish_playback();

    wait_for(|| rig.handle.snapshot().error.is_some());
    let snapshot = rig.handle.snapshot();
    assert_eq!(snapshot.mode, VoiceMode::Idle);
    assert_eq!(rig.input.lock().starts, 1);
    assert_eq!(
        snapshot.error.as_deref(),
        Some("Audio device error. Please check your microphone/speakers.")
    );

    // No retry loop
    thread::sleep(Duration::from_millis(200));
    assert_eq!(rig.input.lock().starts, 1);
    assert_eq!(rig.handle.state().mode(), VoiceMode::Idle);
}
