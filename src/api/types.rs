//! Wire types for the tutor service REST API
//!
//! Response structs default every field the client does not strictly need so
//! that extra or missing fields from the service never fail a decode.

use serde::{Deserialize, Serialize};

/// `POST /upload` response
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub chunk_count: u32,
}

/// `POST /chat` request
#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    pub message: String,
}

/// `POST /chat` response
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatResponse {
    pub response: String,
    pub sources: Vec<String>,
}

/// `GET /tutor/question` response
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TutorQuestion {
    pub question: String,
}

/// `POST /tutor/evaluate` request
#[derive(Clone, Debug, Serialize)]
pub struct EvaluateRequest {
    pub question: String,
    pub user_answer: String,
}

/// Scored feedback for one submitted answer
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Evaluation {
    pub score: u8,
    pub correct_points: Vec<String>,
    pub missing_points: Vec<String>,
    pub improved_answer: String,
}

impl Evaluation {
    /// Feedback shown when the evaluation call fails
    pub fn unavailable() -> Self {
        Self {
            score: 0,
            correct_points: Vec::new(),
            missing_points: vec!["Error evaluating answer. Please try again.".to_string()],
            improved_answer: "Unable to provide feedback at this time.".to_string(),
        }
    }
}

/// `POST /voice/synthesize` request
#[derive(Clone, Debug, Serialize)]
pub struct SynthesizeRequest {
    pub text: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SynthesizeResponse {
    pub audio: Option<String>,
}

/// Server-side progress of a conversational tutor session
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionProgress {
    pub session_id: String,
    pub current_topic: Option<String>,
    pub questions_asked: u32,
    pub correct_answers: u32,
    pub accuracy: f32,
}

impl SessionProgress {
    /// Progress header is only shown once a question has been asked
    pub fn has_activity(&self) -> bool {
        self.questions_asked > 0
    }
}

/// `POST /conversational/chat` request
#[derive(Clone, Debug, Serialize)]
pub struct ConversationRequest {
    pub session_id: String,
    pub message: String,
}

/// `POST /conversational/question` request
#[derive(Clone, Debug, Serialize)]
pub struct QuestionRequest {
    pub session_id: String,
    pub topic: Option<String>,
}

/// `POST /conversational/reset` request
#[derive(Clone, Debug, Serialize)]
pub struct SessionRequest {
    pub session_id: String,
}

/// Conversational chat or question response, normalized
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TutorTurn {
    pub text: String,
    pub session_info: Option<SessionProgress>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ConversationResponse {
    pub response: String,
    pub session_info: Option<SessionProgress>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct QuestionResponse {
    pub question: String,
    pub session_info: Option<SessionProgress>,
}

/// `POST /session/start` and `POST /clear` response
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatusMessage {
    pub success: bool,
    pub message: String,
}

/// `GET /document/status` response
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DocumentStatus {
    pub document_loaded: bool,
    pub chunks_count: u32,
    pub collection_exists: bool,
    pub has_embeddings: u32,
}

/// `GET /health` response
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthStatus {
    pub status: String,
    pub document_loaded: bool,
    pub chunks_count: u32,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// `POST {transcribe_path}` response
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct TranscriptionResponse {
    pub text: String,
}

/// FastAPI-style error body
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ErrorBody {
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// `detail` is a string for handled errors and a list for validation errors
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_decodes_with_missing_fields() {
        let eval: Evaluation = serde_json::from_str(r#"{"score": 7}"#).unwrap();
        assert_eq!(eval.score, 7);
        assert!(eval.correct_points.is_empty());
        assert!(eval.improved_answer.is_empty());
    }

    #[test]
    fn test_unavailable_evaluation() {
        let eval = Evaluation::unavailable();
        assert_eq!(eval.score, 0);
        assert!(eval.correct_points.is_empty());
        assert_eq!(
            eval.missing_points,
            vec!["Error evaluating answer. Please try again.".to_string()]
        );
        assert_eq!(eval.improved_answer, "Unable to provide feedback at this time.");
    }

    #[test]
    fn test_session_info_ignores_extra_fields() {
        let json = r#"{
            "response": "Sure",
            "session_info": {
                "session_id": "session_1",
                "current_topic": null,
                "questions_asked": 3,
                "correct_answers": 2,
                "accuracy": 66.7,
                "mode": "conversation"
            }
        }"#;
        let resp: ConversationResponse = serde_json::from_str(json).unwrap();
        let info = resp.session_info.unwrap();
        assert_eq!(info.questions_asked, 3);
        assert_eq!(info.correct_answers, 2);
        assert!(info.has_activity());
    }

    #[test]
    fn test_question_request_serializes_null_topic() {
        let req = QuestionRequest {
            session_id: "session_1".into(),
            topic: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"session_id":"session_1","topic":null}"#);
    }

    #[test]
    fn test_error_body_detail() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail": "Please upload a document first"}"#).unwrap();
        assert_eq!(
            body.detail_text().as_deref(),
            Some("Please upload a document first")
        );

        let body: ErrorBody = serde_json::from_str(r#"{"detail": [{"loc": ["body"]}]}"#).unwrap();
        assert!(body.detail_text().unwrap().contains("loc"));

        let body: ErrorBody = serde_json::from_str("{}").unwrap();
        assert!(body.detail_text().is_none());
    }
}
