//! View state for every screen, independent of rendering
//!
//! The root tree is intake → mode selection → one interaction view. Nothing
//! here is persisted; navigating away drops the view's state.

pub mod chat;
pub mod intake;
pub mod modes;
pub mod status;
pub mod tutor;

pub use chat::ChatSession;
pub use intake::{format_size_mb, is_supported_file, DocumentIntake, IntakeOutcome};
pub use modes::{Mode, ModeInfo};
pub use status::ServiceStatus;
pub use tutor::{ScoreTier, TutorSession};

use tracing::{debug, warn};

/// Which view the root is showing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Screen {
    #[default]
    Intake,
    ModeSelect,
    Chat,
    Tutor,
    Voice,
}

impl Screen {
    /// Interaction view for a mode
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Chat => Screen::Chat,
            Mode::Tutor => Screen::Tutor,
            Mode::Voice => Screen::Voice,
        }
    }

    pub fn mode(&self) -> Option<Mode> {
        match self {
            Screen::Chat => Some(Mode::Chat),
            Screen::Tutor => Some(Mode::Tutor),
            Screen::Voice => Some(Mode::Voice),
            Screen::Intake | Screen::ModeSelect => None,
        }
    }
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Screen::Intake => write!(f, "Intake"),
            Screen::ModeSelect => write!(f, "ModeSelect"),
            Screen::Chat => write!(f, "Chat"),
            Screen::Tutor => write!(f, "Tutor"),
            Screen::Voice => write!(f, "Voice"),
        }
    }
}

/// Root navigation state
#[derive(Clone, Debug, Default)]
pub struct Navigator {
    screen: Screen,
    document: Option<String>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Name of the uploaded document, once there is one
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    /// Upload finished; only meaningful on the intake screen
    pub fn upload_succeeded(&mut self, document: impl Into<String>) -> bool {
        if self.screen != Screen::Intake {
            warn!("Upload success reported outside intake, ignoring");
            return false;
        }
        self.document = Some(document.into());
        self.go(Screen::ModeSelect);
        true
    }

    pub fn select_mode(&mut self, mode: Mode) -> bool {
        if self.screen != Screen::ModeSelect {
            warn!("Mode selected outside the selector, ignoring");
            return false;
        }
        self.go(Screen::for_mode(mode));
        true
    }

    pub fn back_to_modes(&mut self) -> bool {
        if self.screen.mode().is_none() {
            return false;
        }
        self.go(Screen::ModeSelect);
        true
    }

    /// Start over with a different document
    pub fn new_document(&mut self) {
        self.document = None;
        self.go(Screen::Intake);
    }

    fn go(&mut self, screen: Screen) {
        debug!("Navigating {} -> {}", self.screen, screen);
        self.screen = screen;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_tree() {
        let mut nav = Navigator::new();
        assert_eq!(nav.screen(), Screen::Intake);
        assert!(!nav.select_mode(Mode::Chat));

        assert!(nav.upload_succeeded("notes.pdf"));
        assert_eq!(nav.screen(), Screen::ModeSelect);
        assert_eq!(nav.document(), Some("notes.pdf"));

        assert!(nav.select_mode(Mode::Tutor));
        assert_eq!(nav.screen(), Screen::Tutor);

        assert!(nav.back_to_modes());
        assert_eq!(nav.screen(), Screen::ModeSelect);
        assert!(!nav.back_to_modes());

        nav.select_mode(Mode::Voice);
        nav.new_document();
        assert_eq!(nav.screen(), Screen::Intake);
        assert!(nav.document().is_none());
    }

    #[test]
    fn test_upload_success_only_from_intake() {
        let mut nav = Navigator::new();
        assert!(nav.upload_succeeded("a.txt"));
        assert!(!nav.upload_succeeded("b.txt"));
        assert_eq!(nav.document(), Some("a.txt"));
    }

    #[test]
    fn test_screen_mode_mapping() {
        for mode in Mode::ALL {
            assert_eq!(Screen::for_mode(mode).mode(), Some(mode));
        }
        assert_eq!(Screen::Intake.mode(), None);
    }
}
