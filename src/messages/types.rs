use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of characters of a source snippet shown under a chat answer
pub const SOURCE_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    /// Document excerpts the answer was grounded on
    pub sources: Vec<String>,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            sources: Vec::new(),
            is_error: false,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn assistant_with_sources(text: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            sources,
            ..Self::assistant(text)
        }
    }

    /// Assistant turn standing in for a failed request
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(text)
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Truncated source snippet as displayed under an answer
pub fn source_preview(source: &str) -> String {
    let preview: String = source.chars().take(SOURCE_PREVIEW_CHARS).collect();
    format!("{}...", preview)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let user = Message::user("What is chapter 2 about?");
        assert!(user.is_user());
        assert!(!user.is_error);

        let answer = Message::assistant_with_sources("Photosynthesis.", vec!["p. 12".into()]);
        assert_eq!(answer.role, Role::Assistant);
        assert_eq!(answer.sources, vec!["p. 12".to_string()]);

        let err = Message::error("Sorry");
        assert_eq!(err.role, Role::Assistant);
        assert!(err.is_error);
    }

    #[test]
    fn test_source_preview_truncates_on_chars() {
        let long = "é".repeat(150);
        let preview = source_preview(&long);
        assert_eq!(preview.chars().count(), SOURCE_PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));

        assert_eq!(source_preview("short"), "short...");
    }
}
