//! Interaction modes offered after a document is uploaded

/// Interaction mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Chat,
    Tutor,
    Voice,
}

/// Selector card content for a mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeInfo {
    pub mode: Mode,
    pub title: &'static str,
    pub description: &'static str,
    pub features: [&'static str; 3],
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Chat, Mode::Tutor, Mode::Voice];

    pub fn id(&self) -> &'static str {
        match self {
            Mode::Chat => "chat",
            Mode::Tutor => "tutor",
            Mode::Voice => "voice",
        }
    }

    pub fn info(&self) -> ModeInfo {
        match self {
            Mode::Chat => ModeInfo {
                mode: *self,
                title: "Chat Mode",
                description: "Interactive Q&A with your document",
                features: ["RAG-powered responses", "Source citations", "Context-aware"],
            },
            Mode::Tutor => ModeInfo {
                mode: *self,
                title: "Tutor Mode",
                description: "Practice with AI-generated questions",
                features: ["Auto questions", "Instant feedback", "Progress tracking"],
            },
            Mode::Voice => ModeInfo {
                mode: *self,
                title: "Voice Tutor",
                description: "Natural voice-based learning",
                features: ["Voice interface", "Natural dialogue", "Adaptive learning"],
            },
        }
    }

    /// Parse a mode id as used in config and logs
    pub fn from_id(id: &str) -> Option<Mode> {
        Mode::ALL.into_iter().find(|m| m.id() == id)
    }
}
