//! Speech capture and segmentation
//!
//! [`MicrophoneInput`] captures audio, cuts it into utterance segments with
//! [`SpeechSegmenter`], and sends each segment to the service for
//! transcription. Every non-empty transcript becomes a final fragment.
//! Each segment is bracketed by `TranscriptionPending` and
//! `TranscriptionSettled` so the silence timer can wait for it.

use super::DeviceEvent;
use crate::config::VoiceConfig;
use crate::Result;
use crossbeam_channel::Sender;
use std::mem;

/// Speech capture device
pub trait SpeechInput: Send {
    /// Start capturing; fragments and activity are sent on `events`
    fn start(&mut self, events: Sender<DeviceEvent>) -> Result<()>;

    /// Stop capturing and drop anything not yet transcribed
    ///
    /// Returns once capture has stopped. No [`DeviceEvent::CaptureEnded`] is
    /// sent for a requested stop; that event is only for capture that ends
    /// on its own.
    fn stop(&mut self);
}

/// Segmentation thresholds
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmenterConfig {
    pub threshold: f32,
    pub hangover_ms: u64,
    pub min_speech_ms: u64,
    pub max_segment_ms: u64,
}

impl SegmenterConfig {
    pub fn from_voice(config: &VoiceConfig) -> Self {
        Self {
            threshold: config.speech_threshold,
            hangover_ms: config.segment_hangover_ms,
            min_speech_ms: config.min_speech_ms,
            max_segment_ms: config.max_segment_ms,
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self::from_voice(&VoiceConfig::default())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SegmentEvent {
    /// At least one loud frame in this chunk
    Activity,
    /// A complete utterance
    Segment(Vec<f32>),
}

const FRAME_MS: u64 = 20;

/// Energy-based utterance segmenter
///
/// Audio is judged in 20 ms frames. A segment opens on the first frame
/// whose RMS reaches the threshold and closes after `hangover_ms` of quiet
/// or at `max_segment_ms`. Segments with less than `min_speech_ms` of loud
/// audio are discarded.
pub struct SpeechSegmenter {
    config: SegmenterConfig,
    frame_len: usize,
    carry: Vec<f32>,
    segment: Vec<f32>,
    in_speech: bool,
    speech_frames: u64,
    silent_frames: u64,
}

impl SpeechSegmenter {
    pub fn new(config: SegmenterConfig, sample_rate: u32) -> Self {
        let frame_len = ((sample_rate as u64 * FRAME_MS) / 1000).max(1) as usize;
        Self {
            config,
            frame_len,
            carry: Vec::new(),
            segment: Vec::new(),
            in_speech: false,
            speech_frames: 0,
            silent_frames: 0,
        }
    }

    pub fn is_in_speech(&self) -> bool {
        self.in_speech
    }

    /// Feed samples; partial frames carry over to the next call
    pub fn push(&mut self, samples: &[f32]) -> Vec<SegmentEvent> {
        self.carry.extend_from_slice(samples);

        let mut heard = false;
        let mut segments = Vec::new();
        let mut offset = 0;

        while self.carry.len() - offset >= self.frame_len {
            let frame = self.carry[offset..offset + self.frame_len].to_vec();
            offset += self.frame_len;

            let loud = rms(&frame) >= self.config.threshold;
            if loud {
                heard = true;
                self.in_speech = true;
                self.speech_frames += 1;
                self.silent_frames = 0;
                self.segment.extend_from_slice(&frame);
            } else if self.in_speech {
                self.silent_frames += 1;
                self.segment.extend_from_slice(&frame);
                if self.silent_frames * FRAME_MS >= self.config.hangover_ms {
                    segments.extend(self.close());
                }
            }

            let segment_ms = (self.segment.len() / self.frame_len) as u64 * FRAME_MS;
            if self.in_speech && segment_ms >= self.config.max_segment_ms {
                segments.extend(self.close());
            }
        }
        self.carry.drain(..offset);

        let mut events = Vec::with_capacity(segments.len() + 1);
        if heard {
            events.push(SegmentEvent::Activity);
        }
        events.extend(segments.into_iter().map(SegmentEvent::Segment));
        events
    }

    /// Close any open segment, e.g. when capture stops
    pub fn flush(&mut self) -> Option<Vec<f32>> {
        self.carry.clear();
        if self.in_speech {
            self.close()
        } else {
            None
        }
    }

    fn close(&mut self) -> Option<Vec<f32>> {
        let speech_ms = self.speech_frames * FRAME_MS;
        self.in_speech = false;
        self.speech_frames = 0;
        self.silent_frames = 0;

        let segment = mem::take(&mut self.segment);
        (speech_ms >= self.config.min_speech_ms).then_some(segment)
    }
}

fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f32 = frame.iter().map(|s| s * s).sum();
    (sum / frame.len() as f32).sqrt()
}

#[cfg(feature = "audio-io")]
pub use microphone::MicrophoneInput;

#[cfg(feature = "audio-io")]
mod microphone {
    use super::{SegmentEvent, SegmenterConfig, SpeechInput, SpeechSegmenter};
    use crate::api::{ApiCall, ApiHandle, ApiReply};
    use crate::audio::{encode_wav, input_available, AudioInput};
    use crate::voice::DeviceEvent;
    use crate::{DocTutorError, Result};
    use crossbeam_channel::{bounded, select, Receiver, Sender};
    use std::thread::{self, JoinHandle};
    use std::time::{Duration, Instant};
    use tracing::{debug, error, info, warn};

    const ACTIVITY_INTERVAL: Duration = Duration::from_millis(250);
    const START_TIMEOUT: Duration = Duration::from_secs(3);

    struct Capture {
        stop_tx: Sender<()>,
        thread: JoinHandle<()>,
    }

    /// Default microphone with service-side transcription
    pub struct MicrophoneInput {
        api: ApiHandle,
        config: SegmenterConfig,
        capture: Option<Capture>,
    }

    impl MicrophoneInput {
        /// Fails when the host has no input device
        pub fn probe(api: &ApiHandle, config: SegmenterConfig) -> Result<Self> {
            if !input_available() {
                return Err(DocTutorError::Unsupported(
                    "No microphone available".into(),
                ));
            }
            Ok(Self {
                api: api.fork(),
                config,
                capture: None,
            })
        }
    }

    impl SpeechInput for MicrophoneInput {
        fn start(&mut self, events: Sender<DeviceEvent>) -> Result<()> {
            self.stop();

            let (stop_tx, stop_rx) = bounded(1);
            let (ready_tx, ready_rx) = bounded(1);
            let api = self.api.fork();
            let config = self.config;

            let thread = thread::Builder::new()
                .name("doctutor-capture".into())
                .spawn(move || run_capture(api, config, events, stop_rx, ready_tx))
                .map_err(|e| {
                    DocTutorError::AudioDeviceError(format!("Failed to spawn capture: {}", e))
                })?;

            match ready_rx.recv_timeout(START_TIMEOUT) {
                Ok(Ok(())) => {
                    self.capture = Some(Capture { stop_tx, thread });
                    Ok(())
                }
                Ok(Err(e)) => {
                    let _ = thread.join();
                    Err(e)
                }
                Err(_) => {
                    let _ = stop_tx.send(());
                    Err(DocTutorError::AudioDeviceError(
                        "Microphone did not start".into(),
                    ))
                }
            }
        }

        fn stop(&mut self) {
            if let Some(capture) = self.capture.take() {
                let _ = capture.stop_tx.send(());
                if capture.thread.join().is_err() {
                    error!("Capture thread panicked");
                }
            }
        }
    }

    impl Drop for MicrophoneInput {
        fn drop(&mut self) {
            self.stop();
        }
    }

    fn run_capture(
        api: ApiHandle,
        config: SegmenterConfig,
        events: Sender<DeviceEvent>,
        stop_rx: Receiver<()>,
        ready_tx: Sender<Result<()>>,
    ) {
        let (audio_tx, audio_rx) = bounded::<Vec<f32>>(100);
        let (error_tx, error_rx) = bounded::<String>(4);

        let mut input = match AudioInput::new() {
            Ok(input) => input,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        if let Err(e) = input.start(audio_tx, error_tx) {
            let _ = ready_tx.send(Err(e));
            return;
        }
        let _ = ready_tx.send(Ok(()));

        let sample_rate = input.sample_rate();
        let mut segmenter = SpeechSegmenter::new(config, sample_rate);
        let mut last_activity: Option<Instant> = None;
        let replies = api.replies().clone();
        info!("Listening at {} Hz", sample_rate);

        let ended_on_its_own = loop {
            select! {
                recv(stop_rx) -> _ => break false,
                recv(audio_rx) -> msg => match msg {
                    Ok(samples) => {
                        for event in segmenter.push(&samples) {
                            match event {
                                SegmentEvent::Activity => {
                                    let due = last_activity
                                        .map_or(true, |at| at.elapsed() >= ACTIVITY_INTERVAL);
                                    if due {
                                        last_activity = Some(Instant::now());
                                        let _ = events.send(DeviceEvent::SpeechActivity);
                                    }
                                }
                                SegmentEvent::Segment(segment) => {
                                    transcribe(&api, &events, &segment, sample_rate)
                                }
                            }
                        }
                    }
                    Err(_) => break true,
                },
                recv(error_rx) -> msg => {
                    if let Ok(message) = msg {
                        let _ = events.send(DeviceEvent::CaptureError(message));
                    }
                    break true;
                },
                recv(replies) -> msg => {
                    if let Ok(response) = msg {
                        settle(&events, response.result);
                    }
                },
            }
        };

        input.stop();
        if ended_on_its_own {
            let _ = events.send(DeviceEvent::CaptureEnded);
        }
        info!("Capture stopped");
    }

    fn transcribe(
        api: &ApiHandle,
        events: &Sender<DeviceEvent>,
        segment: &[f32],
        sample_rate: u32,
    ) {
        match encode_wav(segment, sample_rate) {
            Ok(wav) => {
                debug!("Transcribing {} samples", segment.len());
                api.submit(ApiCall::Transcribe { wav });
                let _ = events.send(DeviceEvent::TranscriptionPending);
            }
            Err(e) => warn!("Dropping segment: {}", e),
        }
    }

    /// Forward a transcript, then mark its transcription as settled
    fn settle(events: &Sender<DeviceEvent>, result: Result<ApiReply>) {
        match result {
            Ok(ApiReply::Transcript(text)) => {
                let text = text.trim();
                if !text.is_empty() {
                    let _ = events.send(DeviceEvent::Fragment {
                        text: text.to_string(),
                        is_final: true,
                    });
                }
            }
            Ok(other) => warn!("Unexpected reply to transcription: {:?}", other),
            Err(e) => warn!("Transcription failed: {}", e),
        }
        let _ = events.send(DeviceEvent::TranscriptionSettled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16000;
    const FRAME: usize = 320;

    fn tone(ms: usize) -> Vec<f32> {
        (0..RATE as usize * ms / 1000)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / RATE as f32).sin() * 0.5)
            .collect()
    }

    fn quiet(ms: usize) -> Vec<f32> {
        vec![0.0; RATE as usize * ms / 1000]
    }

    fn segments(events: &[SegmentEvent]) -> Vec<&Vec<f32>> {
        events
            .iter()
            .filter_map(|e| match e {
                SegmentEvent::Segment(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_utterance_closed_after_hangover() {
        let mut segmenter = SpeechSegmenter::new(SegmenterConfig::default(), RATE);

        let events = segmenter.push(&tone(500));
        assert_eq!(events, vec![SegmentEvent::Activity]);
        assert!(segmenter.is_in_speech());

        let events = segmenter.push(&quiet(700));
        let found = segments(&events);
        assert_eq!(found.len(), 1);
        // 25 loud frames plus 30 frames of hangover
        assert_eq!(found[0].len(), 55 * FRAME);
        assert!(!segmenter.is_in_speech());
    }

    #[test]
    fn test_short_blip_discarded() {
        let mut segmenter = SpeechSegmenter::new(SegmenterConfig::default(), RATE);

        segmenter.push(&tone(100));
        let events = segmenter.push(&quiet(1000));
        assert!(segments(&events).is_empty());
    }

    #[test]
    fn test_silence_produces_nothing() {
        let mut segmenter = SpeechSegmenter::new(SegmenterConfig::default(), RATE);
        assert!(segmenter.push(&quiet(2000)).is_empty());
        assert_eq!(segmenter.flush(), None);
    }

    #[test]
    fn test_long_speech_split_at_max() {
        let config = SegmenterConfig {
            max_segment_ms: 1000,
            ..SegmenterConfig::default()
        };
        let mut segmenter = SpeechSegmenter::new(config, RATE);

        let events = segmenter.push(&tone(2500));
        let found = segments(&events);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|s| s.len() == 50 * FRAME));

        let rest = segmenter.flush().unwrap();
        assert_eq!(rest.len(), 25 * FRAME);
    }

    #[test]
    fn test_max_length_counts_pauses_inside_speech() {
        let config = SegmenterConfig {
            max_segment_ms: 1000,
            ..SegmenterConfig::default()
        };
        let mut segmenter = SpeechSegmenter::new(config, RATE);

        // Pauses shorter than the hangover keep the segment open
        let mut audio = Vec::new();
        for _ in 0..3 {
            audio.extend(tone(300));
            audio.extend(quiet(400));
        }

        let events = segmenter.push(&audio);
        let found = segments(&events);
        assert_eq!(found[0].len(), 50 * FRAME);
    }

    #[test]
    fn test_partial_frames_carry_over() {
        let mut segmenter = SpeechSegmenter::new(SegmenterConfig::default(), RATE);
        let audio = tone(400);

        for chunk in audio.chunks(100) {
            segmenter.push(chunk);
        }
        assert!(segmenter.is_in_speech());
        assert_eq!(segmenter.flush().unwrap().len(), 20 * FRAME);
    }

    #[test]
    fn test_config_from_voice_settings() {
        let voice = VoiceConfig {
            speech_threshold: 0.1,
            ..VoiceConfig::default()
        };
        let config = SegmenterConfig::from_voice(&voice);
        assert_eq!(config.threshold, 0.1);
        assert_eq!(config.hangover_ms, voice.segment_hangover_ms);
    }
}
