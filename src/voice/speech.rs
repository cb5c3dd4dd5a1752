//! Speech output devices
//!
//! Server audio is played through the default output device. When the
//! service returns no audio, text is spoken by a local synthesizer program
//! at a slightly reduced rate.

use super::playback::{ActivePlayback, PlaybackToken, SpeechOutput};
use super::DeviceEvent;
use crate::config::VoiceConfig;
use crate::{DocTutorError, Result};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::env;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const WAIT_INTERVAL: Duration = Duration::from_millis(20);

/// A text-to-speech program invoked as `program [args..] -- <text>`
#[derive(Clone, Debug, PartialEq)]
pub struct SystemSpeech {
    program: String,
    args: Vec<String>,
}

impl SystemSpeech {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Configured program, or the platform synthesizer if one is installed
    pub fn detect(config: &VoiceConfig) -> Option<Self> {
        if let Some(program) = &config.speech_program {
            return Some(Self::new(program.clone(), config.speech_args.clone()));
        }

        // Rates are roughly 0.9x each tool's default
        let candidates: &[(&str, &[&str])] = if cfg!(target_os = "macos") {
            &[("say", &["-r", "158"])]
        } else {
            &[("espeak-ng", &["-s", "157"]), ("espeak", &["-s", "157"])]
        };

        let found = candidates
            .iter()
            .find(|(program, _)| find_in_path(program).is_some())
            .map(|(program, args)| {
                Self::new(*program, args.iter().map(|a| a.to_string()).collect())
            });

        match &found {
            Some(speech) => info!("Using local speech synthesizer: {}", speech.program),
            None => warn!("No local speech synthesizer found"),
        }
        found
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Start speaking; completion is reported on `events`
    pub fn speak(
        &self,
        token: PlaybackToken,
        text: &str,
        events: Sender<DeviceEvent>,
    ) -> Result<ProcessPlayback> {
        let child = self.command(text).spawn().map_err(|e| {
            DocTutorError::SpeechError(format!("Failed to start {}: {}", self.program, e))
        })?;

        debug!("Speaking {} chars with {} ({})", text.len(), self.program, token);
        ProcessPlayback::watch(token, self.program.clone(), child, events)
    }

    /// `program [args..] -- <text>`, so text starting with `-` is not an option
    fn command(&self, text: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }
}

fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// A running synthesizer process
pub struct ProcessPlayback {
    child: Arc<Mutex<Child>>,
    stopped: Arc<AtomicBool>,
}

impl ProcessPlayback {
    fn watch(
        token: PlaybackToken,
        program: String,
        child: Child,
        events: Sender<DeviceEvent>,
    ) -> Result<Self> {
        let child = Arc::new(Mutex::new(child));
        let stopped = Arc::new(AtomicBool::new(false));

        let watched = Arc::clone(&child);
        let flag = Arc::clone(&stopped);
        thread::Builder::new()
            .name("doctutor-speech".into())
            .spawn(move || loop {
                thread::sleep(WAIT_INTERVAL);
                if flag.load(Ordering::SeqCst) {
                    return;
                }

                let status = watched.lock().try_wait();
                let event = match status {
                    Ok(None) => continue,
                    Ok(Some(status)) if status.success() => {
                        DeviceEvent::PlaybackFinished(token)
                    }
                    Ok(Some(status)) => DeviceEvent::PlaybackFailed(
                        token,
                        format!("{} exited with {}", program, status),
                    ),
                    Err(e) => DeviceEvent::PlaybackFailed(token, e.to_string()),
                };

                if !flag.load(Ordering::SeqCst) {
                    let _ = events.send(event);
                }
                return;
            })
            .map_err(|e| {
                DocTutorError::SpeechError(format!("Failed to watch synthesizer: {}", e))
            })?;

        Ok(Self { child, stopped })
    }
}

impl ActivePlayback for ProcessPlayback {
    fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut child = self.child.lock();
        if let Ok(None) = child.try_wait() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(feature = "audio-io")]
struct ClipPlayback(crate::audio::AudioPlayback);

#[cfg(feature = "audio-io")]
impl ActivePlayback for ClipPlayback {
    fn stop(&mut self) {
        self.0.stop();
    }
}

/// Default output: speakers for server audio, [`SystemSpeech`] for text
pub struct DeviceOutput {
    speech: Option<SystemSpeech>,
}

impl DeviceOutput {
    pub fn new(speech: Option<SystemSpeech>) -> Self {
        Self { speech }
    }

    pub fn detect(config: &VoiceConfig) -> Self {
        Self::new(SystemSpeech::detect(config))
    }
}

impl SpeechOutput for DeviceOutput {
    #[cfg(feature = "audio-io")]
    fn play_audio(
        &mut self,
        token: PlaybackToken,
        audio: Vec<u8>,
        events: Sender<DeviceEvent>,
    ) -> Result<Box<dyn ActivePlayback>> {
        debug!("Playing {} bytes of server audio ({})", audio.len(), token);
        let playback = crate::audio::play_encoded(audio, move |result| {
            let event = match result {
                Ok(()) => DeviceEvent::PlaybackFinished(token),
                Err(e) => DeviceEvent::PlaybackFailed(token, e.to_string()),
            };
            let _ = events.send(event);
        })?;
        Ok(Box::new(ClipPlayback(playback)))
    }

    #[cfg(not(feature = "audio-io"))]
    fn play_audio(
        &mut self,
        _token: PlaybackToken,
        _audio: Vec<u8>,
        _events: Sender<DeviceEvent>,
    ) -> Result<Box<dyn ActivePlayback>> {
        Err(DocTutorError::Unsupported(
            "Audio playback is not available in this build".into(),
        ))
    }

    fn speak(
        &mut self,
        token: PlaybackToken,
        text: &str,
        events: Sender<DeviceEvent>,
    ) -> Result<Box<dyn ActivePlayback>> {
        match &self.speech {
            Some(speech) => Ok(Box::new(speech.speak(token, text, events)?)),
            None => Err(DocTutorError::SpeechError(
                "No speech synthesizer available".into(),
            )),
        }
    }
}
