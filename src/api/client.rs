//! Async HTTP client for the tutor service
//!
//! One method per endpoint. Non-success statuses become
//! [`DocTutorError::Backend`] carrying the service's `detail` text.

use super::types::*;
use crate::config::ApiConfig;
use crate::{DocTutorError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Thin typed wrapper over a shared `reqwest::Client`
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    transcribe_path: String,
}

impl ApiClient {
    /// Create a client for the configured service
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            transcribe_path: config.transcribe_path.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success response into a backend error
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.detail_text());
        debug!("Backend returned {}: {:?}", status, detail);

        Err(DocTutorError::Backend {
            status: status.as_u16(),
            detail,
        })
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let resp = Self::check(resp).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Upload one document as multipart field `file`
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadResponse> {
        let mime = if file_name.to_ascii_lowercase().ends_with(".pdf") {
            "application/pdf"
        } else {
            "text/plain"
        };
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = Form::new().part("file", part);

        let resp = self
            .http
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await?;
        Self::decode(resp).await
    }

    pub async fn chat(&self, message: &str) -> Result<ChatResponse> {
        let resp = self
            .http
            .post(self.url("/chat"))
            .json(&ChatRequest {
                message: message.to_string(),
            })
            .send()
            .await?;
        Self::decode(resp).await
    }

    pub async fn tutor_question(&self) -> Result<TutorQuestion> {
        let resp = self.http.get(self.url("/tutor/question")).send().await?;
        Self::decode(resp).await
    }

    pub async fn evaluate(&self, question: &str, user_answer: &str) -> Result<Evaluation> {
        let resp = self
            .http
            .post(self.url("/tutor/evaluate"))
            .json(&EvaluateRequest {
                question: question.to_string(),
                user_answer: user_answer.to_string(),
            })
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// Synthesize speech; `None` when the service has no audio for this text
    pub async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>> {
        let resp = self
            .http
            .post(self.url("/voice/synthesize"))
            .json(&SynthesizeRequest {
                text: text.to_string(),
            })
            .send()
            .await?;
        let body: SynthesizeResponse = Self::decode(resp).await?;
        body.audio
            .as_deref()
            .filter(|audio| !audio.trim().is_empty())
            .map(decode_audio)
            .transpose()
    }

    pub async fn conversation_chat(&self, session_id: &str, message: &str) -> Result<TutorTurn> {
        let resp = self
            .http
            .post(self.url("/conversational/chat"))
            .json(&ConversationRequest {
                session_id: session_id.to_string(),
                message: message.to_string(),
            })
            .send()
            .await?;
        let body: ConversationResponse = Self::decode(resp).await?;
        Ok(TutorTurn {
            text: body.response,
            session_info: body.session_info,
        })
    }

    pub async fn conversation_question(
        &self,
        session_id: &str,
        topic: Option<&str>,
    ) -> Result<TutorTurn> {
        let resp = self
            .http
            .post(self.url("/conversational/question"))
            .json(&QuestionRequest {
                session_id: session_id.to_string(),
                topic: topic.map(str::to_string),
            })
            .send()
            .await?;
        let body: QuestionResponse = Self::decode(resp).await?;
        Ok(TutorTurn {
            text: body.question,
            session_info: body.session_info,
        })
    }

    pub async fn reset_session(&self, session_id: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url("/conversational/reset"))
            .json(&SessionRequest {
                session_id: session_id.to_string(),
            })
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn progress(&self, session_id: &str) -> Result<SessionProgress> {
        let resp = self
            .http
            .get(self.url(&format!("/conversational/progress/{}", session_id)))
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// Drop the server's current document so a new one can be uploaded
    pub async fn start_session(&self) -> Result<StatusMessage> {
        let resp = self.http.post(self.url("/session/start")).send().await?;
        Self::decode(resp).await
    }

    pub async fn clear_document(&self) -> Result<StatusMessage> {
        let resp = self.http.post(self.url("/clear")).send().await?;
        Self::decode(resp).await
    }

    pub async fn document_status(&self) -> Result<DocumentStatus> {
        let resp = self.http.get(self.url("/document/status")).send().await?;
        Self::decode(resp).await
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let resp = self.http.get(self.url("/health")).send().await?;
        Self::decode(resp).await
    }

    /// Transcribe one WAV-encoded utterance
    pub async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        let part = Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")?;
        let form = Form::new().part("file", part);

        let resp = self
            .http
            .post(self.url(&self.transcribe_path))
            .multipart(form)
            .send()
            .await?;
        let body: TranscriptionResponse = Self::decode(resp).await?;
        Ok(body.text)
    }
}

/// Decode a base64 audio payload, with or without a `data:` URL prefix
pub fn decode_audio(payload: &str) -> Result<Vec<u8>> {
    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
        None => payload,
    };
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| DocTutorError::Decode(format!("Invalid audio payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = ApiConfig {
            base_url: "http://localhost:8000/".to_string(),
            ..Default::default()
        };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/chat"), "http://localhost:8000/chat");
    }

    #[test]
    fn test_decode_audio_plain_and_data_url() {
        assert_eq!(decode_audio("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_audio("data:audio/mp3;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
        assert!(matches!(
            decode_audio("not base64!"),
            Err(DocTutorError::Decode(_))
        ));
    }
}
