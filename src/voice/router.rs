//! Intent routing for voice utterances
//!
//! A keyword match, not a parser: any utterance mentioning one of
//! [`QUIZ_KEYWORDS`] asks the tutor for a question, everything else is
//! conversation. Paraphrases like "ask me something" are not recognized.

use crate::api::ApiCall;

/// Phrases that request a quiz question, matched case-insensitively
pub const QUIZ_KEYWORDS: [&str; 3] = ["quiz me", "test me", "practice"];

/// Where an utterance goes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// Generate a question, optionally about the words left after the keyword
    Quiz { topic: Option<String> },
    /// General conversation
    Chat(String),
}

impl Route {
    /// The service call for this route within a session
    pub fn into_call(self, session_id: &str) -> ApiCall {
        match self {
            Route::Quiz { topic } => ApiCall::ConversationQuestion {
                session_id: session_id.to_string(),
                topic,
            },
            Route::Chat(message) => ApiCall::ConversationChat {
                session_id: session_id.to_string(),
                message,
            },
        }
    }
}

/// Decide where an utterance goes
pub fn route_utterance(text: &str) -> Route {
    let mut matched = false;
    let mut residual = String::with_capacity(text.len());
    let mut rest = text;

    'scan: while let Some(c) = rest.chars().next() {
        for keyword in QUIZ_KEYWORDS {
            if starts_with_ignore_case(rest, keyword) {
                matched = true;
                rest = &rest[keyword.len()..];
                continue 'scan;
            }
        }
        residual.push(c);
        rest = &rest[c.len_utf8()..];
    }

    if matched {
        let topic = residual.trim();
        Route::Quiz {
            topic: (!topic.is_empty()).then(|| topic.to_string()),
        }
    } else {
        Route::Chat(text.to_string())
    }
}

fn starts_with_ignore_case(text: &str, keyword: &str) -> bool {
    text.get(..keyword.len())
        .map(|head| head.eq_ignore_ascii_case(keyword))
        .unwrap_or(false)
}
