//! The single active playback handle
//!
//! Server audio and local speech synthesis both produce an
//! [`ActivePlayback`]. [`PlaybackSlot`] owns at most one of them and always
//! stops the current one before the next is started, so two outputs never
//! overlap.

use super::DeviceEvent;
use crate::Result;
use crossbeam_channel::Sender;
use tracing::debug;

/// Identifies one playback so late completions can be told apart
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackToken(pub u64);

impl std::fmt::Display for PlaybackToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A playback in progress
///
/// Implementations report completion by sending
/// [`DeviceEvent::PlaybackFinished`] with their token. After `stop` they may
/// still send it; receivers ignore tokens they no longer track.
pub trait ActivePlayback: Send {
    /// Stop output immediately
    fn stop(&mut self);
}

/// Speech output device
pub trait SpeechOutput: Send {
    /// Play encoded audio (mp3/wav/ogg) returned by the service
    fn play_audio(
        &mut self,
        token: PlaybackToken,
        audio: Vec<u8>,
        events: Sender<DeviceEvent>,
    ) -> Result<Box<dyn ActivePlayback>>;

    /// Speak text with a local synthesizer
    fn speak(
        &mut self,
        token: PlaybackToken,
        text: &str,
        events: Sender<DeviceEvent>,
    ) -> Result<Box<dyn ActivePlayback>>;
}

/// Owner of the one active playback
#[derive(Default)]
pub struct PlaybackSlot {
    active: Option<(PlaybackToken, Box<dyn ActivePlayback>)>,
}

impl PlaybackSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the current playback, then start a new one
    ///
    /// On error the slot is left empty.
    pub fn start<F>(&mut self, token: PlaybackToken, start: F) -> Result<()>
    where
        F: FnOnce() -> Result<Box<dyn ActivePlayback>>,
    {
        self.stop();
        let playback = start()?;
        debug!("Playback {} active", token);
        self.active = Some((token, playback));
        Ok(())
    }

    /// Stop and drop the active playback, if any
    pub fn stop(&mut self) {
        if let Some((token, mut playback)) = self.active.take() {
            debug!("Stopping playback {}", token);
            playback.stop();
        }
    }

    /// Forget a playback that completed on its own
    ///
    /// Returns false for tokens that are no longer active.
    pub fn finished(&mut self, token: PlaybackToken) -> bool {
        if self.token() == Some(token) {
            self.active = None;
            true
        } else {
            false
        }
    }

    pub fn token(&self) -> Option<PlaybackToken> {
        self.active.as_ref().map(|(token, _)| *token)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for PlaybackSlot {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records start/stop order across playbacks
    struct Recorded {
        id: u64,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorded {
        fn start(id: u64, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn ActivePlayback> {
            log.lock().push(format!("start {}", id));
            Box::new(Self {
                id,
                log: Arc::clone(log),
            })
        }
    }

    impl ActivePlayback for Recorded {
        fn stop(&mut self) {
            self.log.lock().push(format!("stop {}", self.id));
        }
    }

    #[test]
    fn test_previous_stopped_before_next_starts() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut slot = PlaybackSlot::new();

        slot.start(PlaybackToken(1), || Ok(Recorded::start(1, &log)))
            .unwrap();
        slot.start(PlaybackToken(2), || Ok(Recorded::start(2, &log)))
            .unwrap();

        assert_eq!(slot.token(), Some(PlaybackToken(2)));
        assert_eq!(*log.lock(), vec!["start 1", "stop 1", "start 2"]);
    }

    #[test]
    fn test_failed_start_leaves_slot_empty() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut slot = PlaybackSlot::new();

        slot.start(PlaybackToken(1), || Ok(Recorded::start(1, &log)))
            .unwrap();
        let result = slot.start(PlaybackToken(2), || {
            Err(crate::DocTutorError::SpeechError("no synthesizer".into()))
        });

        assert!(result.is_err());
        assert!(!slot.is_active());
        assert_eq!(*log.lock(), vec!["start 1", "stop 1"]);
    }

    #[test]
    fn test_stale_finish_ignored() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut slot = PlaybackSlot::new();

        slot.start(PlaybackToken(1), || Ok(Recorded::start(1, &log)))
            .unwrap();
        slot.start(PlaybackToken(2), || Ok(Recorded::start(2, &log)))
            .unwrap();

        assert!(!slot.finished(PlaybackToken(1)));
        assert!(slot.is_active());
        assert!(slot.finished(PlaybackToken(2)));
        assert!(!slot.is_active());
    }

    #[test]
    fn test_drop_stops_active() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let mut slot = PlaybackSlot::new();
            slot.start(PlaybackToken(7), || Ok(Recorded::start(7, &log)))
                .unwrap();
        }
        assert_eq!(*log.lock(), vec!["start 7", "stop 7"]);
    }
}
