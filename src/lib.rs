//! DocTutor - desktop client for a document tutoring service
//!
//! Upload a PDF or TXT document, then study it by chatting with it, by
//! answering generated questions, or through a hands-free voice tutor that
//! listens, answers aloud and listens again.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod messages;
pub mod session;
pub mod ui;
pub mod voice;

// Re-export error types
pub use error::{DocTutorError, Result};

pub use api::{ApiClient, ApiHandle, ApiWorker};
pub use config::AppConfig;
pub use ui::DocTutorApp;
