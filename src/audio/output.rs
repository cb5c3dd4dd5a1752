use crate::{DocTutorError, Result};
use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// One encoded clip playing on the default output device
///
/// The output stream is not `Send`, so each clip gets its own thread that
/// owns the stream and sink for the clip's lifetime.
pub struct AudioPlayback {
    stopped: Arc<AtomicBool>,
}

impl AudioPlayback {
    /// Stop output; the completion callback will not run
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

impl Drop for AudioPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decode and play mp3/wav/ogg bytes
///
/// `on_done` runs on the playback thread when the clip ends or fails to
/// play, unless the playback was stopped first.
pub fn play_encoded<F>(audio: Vec<u8>, on_done: F) -> Result<AudioPlayback>
where
    F: FnOnce(Result<()>) + Send + 'static,
{
    let stopped = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stopped);

    thread::Builder::new()
        .name("doctutor-playback".into())
        .spawn(move || {
            let result = run_clip(audio, &flag);
            if flag.load(Ordering::SeqCst) {
                debug!("Playback stopped before completion");
                return;
            }
            if let Err(e) = &result {
                warn!("Playback failed: {}", e);
            }
            on_done(result);
        })
        .map_err(|e| DocTutorError::AudioDeviceError(format!("Failed to spawn player: {}", e)))?;

    Ok(AudioPlayback { stopped })
}

fn run_clip(audio: Vec<u8>, stopped: &AtomicBool) -> Result<()> {
    let (_stream, handle) = OutputStream::try_default()
        .map_err(|e| DocTutorError::AudioDeviceError(format!("No output device: {}", e)))?;
    let sink = Sink::try_new(&handle)
        .map_err(|e| DocTutorError::AudioDeviceError(format!("Failed to open sink: {}", e)))?;
    let source = Decoder::new(Cursor::new(audio))
        .map_err(|e| DocTutorError::SpeechError(format!("Cannot decode audio: {}", e)))?;

    sink.append(source);
    sink.play();

    while !sink.empty() {
        if stopped.load(Ordering::SeqCst) {
            sink.stop();
            return Ok(());
        }
        thread::sleep(POLL_INTERVAL);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_undecodable_audio_reports_failure() {
        let (tx, rx) = bounded(1);
        let playback = play_encoded(vec![0u8; 16], move |result| {
            let _ = tx.send(result);
        })
        .unwrap();

        // Either the device or the decoder rejects it; both are failures
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(result.is_err());
        drop(playback);
    }
}
