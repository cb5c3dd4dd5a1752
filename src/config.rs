//! Application configuration
//!
//! Configuration is read from a TOML file. Every field has a default, so a
//! missing file or a partial file is fine. Lookup order:
//!
//! 1. `$DOCTUTOR_CONFIG`
//! 2. `<config_dir>/doctutor/config.toml`
//! 3. built-in defaults
//!
//! `$DOCTUTOR_API_URL` overrides `api.base_url` after loading.

use crate::{DocTutorError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "DOCTUTOR_CONFIG";

/// Environment variable overriding the backend base address
pub const API_URL_ENV: &str = "DOCTUTOR_API_URL";

/// Greeting spoken when the voice tutor opens
pub const DEFAULT_GREETING: &str =
    "Hey there! I'm your AI tutor. What would you like to learn today?";

/// Complete application configuration
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub voice: VoiceConfig,
    pub ui: UiConfig,
}

/// Backend connection settings
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base address of the tutor service
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Path of the speech transcription endpoint used by the microphone input
    pub transcribe_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 60,
            transcribe_path: "/voice/transcribe".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Voice loop timing and device settings
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoiceConfig {
    /// Quiet period after the last recognized fragment before submitting
    pub silence_timeout_ms: u64,
    /// Settle delay between playback end and re-arming the microphone
    pub resume_delay_ms: u64,
    /// Greeting added to the transcript when the voice view opens
    pub greeting: String,
    /// Speech synthesis program used when the service returns no audio
    pub speech_program: Option<String>,
    /// Extra arguments passed before the text
    pub speech_args: Vec<String>,
    /// RMS level above which a frame counts as speech
    pub speech_threshold: f32,
    /// Trailing quiet that closes a speech segment
    pub segment_hangover_ms: u64,
    /// Segments shorter than this are dropped as noise
    pub min_speech_ms: u64,
    /// Segments are force-closed at this length
    pub max_segment_ms: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            silence_timeout_ms: 2000,
            resume_delay_ms: 500,
            greeting: DEFAULT_GREETING.to_string(),
            speech_program: None,
            speech_args: Vec::new(),
            speech_threshold: 0.02,
            segment_hangover_ms: 600,
            min_speech_ms: 200,
            max_segment_ms: 15_000,
        }
    }
}

impl VoiceConfig {
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }
}

/// Color scheme
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThemeChoice {
    #[default]
    Dark,
    Light,
}

/// Window and appearance settings
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    pub theme: ThemeChoice,
    pub window_width: f32,
    pub window_height: f32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: ThemeChoice::Dark,
            window_width: 960.0,
            window_height: 720.0,
        }
    }
}

impl AppConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend base address
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api.base_url = url.into();
        self
    }

    /// Set the silence timeout
    pub fn with_silence_timeout_ms(mut self, ms: u64) -> Self {
        self.voice.silence_timeout_ms = ms;
        self
    }

    /// Set the post-playback resume delay
    pub fn with_resume_delay_ms(mut self, ms: u64) -> Self {
        self.voice.resume_delay_ms = ms;
        self
    }

    /// Set the theme
    pub fn with_theme(mut self, theme: ThemeChoice) -> Self {
        self.ui.theme = theme;
        self
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DocTutorError::ConfigError(e.to_string()))
    }

    /// Load a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DocTutorError::ConfigError(format!("{}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("doctutor").join("config.toml"))
    }

    /// Resolve configuration from the environment and the filesystem
    pub fn discover() -> Result<Self> {
        let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load(path)?,
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            debug!("Overriding base URL from {}", API_URL_ENV);
            config.api.base_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let url = self.api.base_url.trim();
        if url.is_empty() {
            return Err(DocTutorError::ConfigError("api.base_url is empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(DocTutorError::ConfigError(format!(
                "api.base_url must be http(s): {}",
                url
            )));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(DocTutorError::ConfigError(
                "api.request_timeout_secs must be positive".into(),
            ));
        }
        if !self.api.transcribe_path.starts_with('/') {
            return Err(DocTutorError::ConfigError(
                "api.transcribe_path must start with '/'".into(),
            ));
        }
        if self.voice.silence_timeout_ms == 0 {
            return Err(DocTutorError::ConfigError(
                "voice.silence_timeout_ms must be positive".into(),
            ));
        }
        if !(self.voice.speech_threshold > 0.0 && self.voice.speech_threshold < 1.0) {
            return Err(DocTutorError::ConfigError(format!(
                "voice.speech_threshold out of range: {}",
                self.voice.speech_threshold
            )));
        }
        if self.voice.max_segment_ms <= self.voice.min_speech_ms {
            return Err(DocTutorError::ConfigError(
                "voice.max_segment_ms must exceed voice.min_speech_ms".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.voice.silence_timeout(), Duration::from_millis(2000));
        assert_eq!(config.voice.resume_delay(), Duration::from_millis(500));
        assert_eq!(config.voice.greeting, DEFAULT_GREETING);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [api]
            base_url = "http://tutor.local:9000"

            [ui]
            theme = "light"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "http://tutor.local:9000");
        assert_eq!(config.api.request_timeout_secs, 60);
        assert_eq!(config.ui.theme, ThemeChoice::Light);
        assert_eq!(config.voice.silence_timeout_ms, 2000);
    }

    #[test]
    fn test_invalid_toml() {
        let err = AppConfig::from_toml("[api\nbase_url = 1").unwrap_err();
        assert!(matches!(err, DocTutorError::ConfigError(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(AppConfig::new().with_base_url("").validate().is_err());
        assert!(AppConfig::new()
            .with_base_url("ftp://example.com")
            .validate()
            .is_err());
        assert!(AppConfig::new().with_silence_timeout_ms(0).validate().is_err());

        let mut config = AppConfig::new();
        config.voice.speech_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builders() {
        let config = AppConfig::new()
            .with_base_url("https://example.com")
            .with_silence_timeout_ms(50)
            .with_resume_delay_ms(10)
            .with_theme(ThemeChoice::Light);
        assert_eq!(config.api.base_url, "https://example.com");
        assert_eq!(config.voice.silence_timeout_ms, 50);
        assert_eq!(config.voice.resume_delay_ms, 10);
        assert_eq!(config.ui.theme, ThemeChoice::Light);
    }
}
