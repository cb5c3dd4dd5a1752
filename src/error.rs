//! Error types for the DocTutor client
//!
//! Every failure the client can observe is folded into [`DocTutorError`].
//! None of them are fatal: views substitute a fallback message and return to
//! an interactive state.

use thiserror::Error;

/// DocTutor client errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocTutorError {
    /// File selection rejected before any request was made
    #[error("Unsupported file: {0}")]
    UnsupportedFile(String),

    /// Transport failure (connection refused, timeout, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a non-success status
    #[error("Backend error ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Backend {
        status: u16,
        detail: Option<String>,
    },

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Audio device initialization or operation error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Speech capture or synthesis error
    #[error("Speech error: {0}")]
    SpeechError(String),

    /// Capability not available on this system
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Channel communication error
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// File system I/O error
    #[error("IO error: {0}")]
    IOError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for DocTutorError {
    fn from(e: std::io::Error) -> Self {
        DocTutorError::IOError(e.to_string())
    }
}

impl From<reqwest::Error> for DocTutorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DocTutorError::Decode(e.to_string())
        } else {
            DocTutorError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for DocTutorError {
    fn from(e: serde_json::Error) -> Self {
        DocTutorError::Decode(e.to_string())
    }
}

impl DocTutorError {
    /// Check if this error is recoverable
    ///
    /// Recoverable errors are retried by the user simply repeating the action.
    pub fn is_recoverable(&self) -> bool {
        match self {
            DocTutorError::UnsupportedFile(_) => true,
            DocTutorError::Network(_) => true,
            DocTutorError::Backend { .. } => true,
            DocTutorError::Decode(_) => true,
            // Hardware/device errors may require user intervention
            DocTutorError::AudioDeviceError(_) => false,
            DocTutorError::SpeechError(_) => true,
            DocTutorError::Unsupported(_) => false,
            // Channel errors indicate internal issues
            DocTutorError::ChannelError(_) => false,
            DocTutorError::IOError(_) => false,
            DocTutorError::ConfigError(_) => false,
        }
    }

    /// Server-provided `detail` text, if the backend sent one
    pub fn detail(&self) -> Option<&str> {
        match self {
            DocTutorError::Backend { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Get a user-friendly description of the error
    pub fn user_message(&self) -> String {
        match self {
            DocTutorError::UnsupportedFile(_) => "Please select a PDF or TXT file".to_string(),
            DocTutorError::Network(_) => {
                "Could not reach the tutor service. Please check that it is running.".to_string()
            }
            DocTutorError::Backend { detail, .. } => detail
                .clone()
                .unwrap_or_else(|| "The tutor service returned an error.".to_string()),
            DocTutorError::Decode(_) => "Unexpected response from the tutor service.".to_string(),
            DocTutorError::AudioDeviceError(_) => {
                "Audio device error. Please check your microphone/speakers.".to_string()
            }
            DocTutorError::SpeechError(_) => {
                "Speech processing failed. Please try again.".to_string()
            }
            DocTutorError::Unsupported(msg) => msg.clone(),
            DocTutorError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            DocTutorError::IOError(_) => "File system error occurred.".to_string(),
            DocTutorError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
        }
    }
}

/// Result type alias for DocTutor operations
pub type Result<T> = std::result::Result<T, DocTutorError>;
