use crate::{DocTutorError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Microphone capture on the default input device
///
/// Delivers mono f32 chunks at the device's native rate. The underlying
/// stream is not `Send`, so create and drop this on one thread.
pub struct AudioInput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    is_recording: Arc<AtomicBool>,
}

/// Whether the default host has any input device
pub fn input_available() -> bool {
    cpal::default_host().default_input_device().is_some()
}

impl AudioInput {
    /// Create a new audio input with the default input device
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| DocTutorError::AudioDeviceError("No input device available".into()))?;

        info!(
            "Using input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let config = device
            .default_input_config()
            .map_err(|e| {
                DocTutorError::AudioDeviceError(format!("Failed to get input config: {}", e))
            })?
            .into();

        Ok(Self {
            device,
            config,
            stream: None,
            is_recording: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get the sample rate of the input device
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Start capturing
    ///
    /// Samples go to `audio_tx`; stream failures are reported on `error_tx`.
    pub fn start(&mut self, audio_tx: Sender<Vec<f32>>, error_tx: Sender<String>) -> Result<()> {
        if self.is_recording.load(Ordering::SeqCst) {
            warn!("Already recording");
            return Ok(());
        }

        let channels = self.config.channels as usize;
        let is_recording = Arc::clone(&self.is_recording);

        let err_fn = move |err: cpal::StreamError| {
            error!("Audio input stream error: {}", err);
            let _ = error_tx.try_send(err.to_string());
        };

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !is_recording.load(Ordering::Relaxed) {
                        return;
                    }

                    let samples = if channels == 1 {
                        data.to_vec()
                    } else {
                        data.chunks(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                            .collect()
                    };

                    if let Err(e) = audio_tx.try_send(samples) {
                        debug!("Dropped audio chunk: {}", e);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| {
                DocTutorError::AudioDeviceError(format!("Failed to build input stream: {}", e))
            })?;

        stream.play().map_err(|e| {
            DocTutorError::AudioDeviceError(format!("Failed to start input stream: {}", e))
        })?;

        self.is_recording.store(true, Ordering::SeqCst);
        self.stream = Some(stream);

        info!("Started audio capture at {} Hz", self.sample_rate());
        Ok(())
    }

    /// Stop capturing
    pub fn stop(&mut self) {
        self.is_recording.store(false, Ordering::SeqCst);

        if self.stream.take().is_some() {
            info!("Stopped audio capture");
        }
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }
}

impl Drop for AudioInput {
    fn drop(&mut self) {
        self.stop();
    }
}
