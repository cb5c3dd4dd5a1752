//! Conversational voice tutor
//!
//! - [`state`]: the pure interaction state machine
//! - [`router`]: keyword routing of utterances
//! - [`playback`]: the single active output handle
//! - [`recognizer`]: speech capture and segmentation
//! - [`speech`]: speech output devices
//! - [`orchestrator`]: the thread that runs the machine against real devices

pub mod orchestrator;
pub mod playback;
pub mod recognizer;
pub mod router;
pub mod speech;
pub mod state;

pub use orchestrator::{
    SharedVoiceState, VoiceCommand, VoiceDevices, VoiceHandle, VoiceOrchestrator, VoiceSnapshot,
};
pub use playback::{ActivePlayback, PlaybackSlot, PlaybackToken, SpeechOutput};
#[cfg(feature = "audio-io")]
pub use recognizer::MicrophoneInput;
pub use recognizer::{SegmentEvent, SegmenterConfig, SpeechInput, SpeechSegmenter};
pub use router::{route_utterance, Route};
pub use speech::{DeviceOutput, SystemSpeech};
pub use state::{Ticket, VoiceEffect, VoiceEvent, VoiceLoop, VoiceMode};

/// Events raised by capture and output devices
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceEvent {
    /// Recognized text; interim fragments replace each other, finals accumulate
    Fragment { text: String, is_final: bool },
    /// Speech is being heard but not yet transcribed
    SpeechActivity,
    /// Captured speech was sent off for transcription
    TranscriptionPending,
    /// A pending transcription came back, after its fragment if it had one
    TranscriptionSettled,
    /// Capture stopped (on request or on its own)
    CaptureEnded,
    /// Capture failed
    CaptureError(String),
    /// Output reached its end
    PlaybackFinished(PlaybackToken),
    /// Output could not be played
    PlaybackFailed(PlaybackToken, String),
}

/// `session_<unix millis>`, generated once per voice view
pub fn new_session_id() -> String {
    format!("session_{}", chrono::Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let id = new_session_id();
        let millis = id.strip_prefix("session_").unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
    }
}
