//! Request worker for the tutor service
//!
//! The UI thread never awaits. Views submit an [`ApiCall`] through an
//! [`ApiHandle`], the worker thread runs it on its own tokio runtime, and the
//! [`ApiResponse`] comes back on the handle's reply channel tagged with the
//! request id. Requests run concurrently and are never cancelled.

use super::client::ApiClient;
use super::types::*;
use crate::config::ApiConfig;
use crate::{DocTutorError, Result};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Identifier of one submitted request, unique per worker
pub type RequestId = u64;

/// A call to the tutor service
#[derive(Clone, Debug, PartialEq)]
pub enum ApiCall {
    Upload { file_name: String, bytes: Vec<u8> },
    Chat { message: String },
    TutorQuestion,
    Evaluate { question: String, user_answer: String },
    Synthesize { text: String },
    ConversationChat { session_id: String, message: String },
    ConversationQuestion { session_id: String, topic: Option<String> },
    ResetSession { session_id: String },
    Progress { session_id: String },
    StartSession,
    ClearDocument,
    DocumentStatus,
    Health,
    Transcribe { wav: Vec<u8> },
}

impl ApiCall {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            ApiCall::Upload { .. } => "upload",
            ApiCall::Chat { .. } => "chat",
            ApiCall::TutorQuestion => "tutor_question",
            ApiCall::Evaluate { .. } => "evaluate",
            ApiCall::Synthesize { .. } => "synthesize",
            ApiCall::ConversationChat { .. } => "conversation_chat",
            ApiCall::ConversationQuestion { .. } => "conversation_question",
            ApiCall::ResetSession { .. } => "reset_session",
            ApiCall::Progress { .. } => "progress",
            ApiCall::StartSession => "start_session",
            ApiCall::ClearDocument => "clear_document",
            ApiCall::DocumentStatus => "document_status",
            ApiCall::Health => "health",
            ApiCall::Transcribe { .. } => "transcribe",
        }
    }
}

/// Successful result of an [`ApiCall`]
#[derive(Clone, Debug, PartialEq)]
pub enum ApiReply {
    Uploaded(UploadResponse),
    Chat(ChatResponse),
    Question(TutorQuestion),
    Evaluation(Evaluation),
    Speech(Option<Vec<u8>>),
    Turn(TutorTurn),
    SessionReset,
    Progress(SessionProgress),
    Status(StatusMessage),
    DocumentStatus(DocumentStatus),
    Health(HealthStatus),
    Transcript(String),
}

/// Reply delivered to the requester
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub id: RequestId,
    pub result: Result<ApiReply>,
}

/// Request as seen by the worker
#[derive(Debug)]
pub struct ApiRequest {
    pub id: RequestId,
    pub call: ApiCall,
    reply_tx: Sender<ApiResponse>,
}

impl ApiRequest {
    /// Deliver the result to whoever submitted this request
    ///
    /// Returns false when the requester has gone away.
    pub fn respond(self, result: Result<ApiReply>) -> bool {
        self.reply_tx
            .send(ApiResponse {
                id: self.id,
                result,
            })
            .is_ok()
    }
}

/// Front end for submitting requests and collecting replies
///
/// Each handle owns its reply channel; use [`ApiHandle::fork`] to give
/// another component its own mailbox on the same worker.
#[derive(Debug)]
pub struct ApiHandle {
    request_tx: Sender<ApiRequest>,
    shutdown_tx: Sender<()>,
    reply_tx: Sender<ApiResponse>,
    reply_rx: Receiver<ApiResponse>,
    next_id: Arc<AtomicU64>,
}

impl ApiHandle {
    fn with_channels(
        request_tx: Sender<ApiRequest>,
        shutdown_tx: Sender<()>,
        next_id: Arc<AtomicU64>,
    ) -> Self {
        let (reply_tx, reply_rx) = unbounded();
        Self {
            request_tx,
            shutdown_tx,
            reply_tx,
            reply_rx,
            next_id,
        }
    }

    /// Handle with no worker behind it
    ///
    /// The returned receiver sees every submitted request, so a test can play
    /// the service and answer with [`ApiRequest::respond`].
    pub fn detached() -> (Self, Receiver<ApiRequest>) {
        let (request_tx, request_rx) = unbounded();
        let (shutdown_tx, _) = bounded(1);
        (
            Self::with_channels(request_tx, shutdown_tx, Arc::new(AtomicU64::new(0))),
            request_rx,
        )
    }

    /// New handle on the same worker with a separate reply channel
    pub fn fork(&self) -> Self {
        Self::with_channels(
            self.request_tx.clone(),
            self.shutdown_tx.clone(),
            Arc::clone(&self.next_id),
        )
    }

    /// Submit a call; the reply arrives later with the returned id
    ///
    /// If the worker is gone the failure is delivered as a reply too, so
    /// callers only ever handle one path.
    pub fn submit(&self, call: ApiCall) -> RequestId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Submitting request {} ({})", id, call.name());

        let request = ApiRequest {
            id,
            call,
            reply_tx: self.reply_tx.clone(),
        };

        if self.request_tx.send(request).is_err() {
            error!("API worker is not running, request {} dropped", id);
            let _ = self.reply_tx.send(ApiResponse {
                id,
                result: Err(DocTutorError::ChannelError(
                    "API worker is not running".to_string(),
                )),
            });
        }

        id
    }

    /// Try to receive a reply (non-blocking)
    pub fn try_recv(&self) -> Option<ApiResponse> {
        self.reply_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for a reply
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ApiResponse> {
        self.reply_rx.recv_timeout(timeout).ok()
    }

    /// Reply receiver, for use in `select!`
    pub fn replies(&self) -> &Receiver<ApiResponse> {
        &self.reply_rx
    }

    /// Ask the worker to stop; in-flight requests are abandoned
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.try_send(());
    }
}

/// Worker that executes requests on a dedicated thread
pub struct ApiWorker {
    client: ApiClient,
    request_rx: Receiver<ApiRequest>,
    shutdown_rx: Receiver<()>,
}

impl ApiWorker {
    /// Create a worker around a client
    ///
    /// Returns both the handle (for submitting requests) and the worker
    /// (to be started in a separate thread).
    pub fn new(client: ApiClient) -> (ApiHandle, Self) {
        let (request_tx, request_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let handle = ApiHandle::with_channels(request_tx, shutdown_tx, Arc::new(AtomicU64::new(0)));
        let worker = Self {
            client,
            request_rx,
            shutdown_rx,
        };

        (handle, worker)
    }

    /// Build a client from config and start a worker for it
    pub fn spawn(config: &ApiConfig) -> Result<(ApiHandle, JoinHandle<()>)> {
        let client = ApiClient::new(config)?;
        let (handle, worker) = Self::new(client);
        Ok((handle, worker.start()))
    }

    /// Start the worker thread
    pub fn start(self) -> JoinHandle<()> {
        thread::spawn(move || {
            if let Err(e) = self.run() {
                error!("API worker error: {}", e);
            }
        })
    }

    fn run(self) -> Result<()> {
        let runtime = tokio::runtime::Runtime::new().map_err(|e| {
            DocTutorError::ChannelError(format!("Failed to create runtime: {}", e))
        })?;

        info!("API worker started for {}", self.client.base_url());

        loop {
            select! {
                recv(self.request_rx) -> msg => match msg {
                    Ok(request) => {
                        let client = self.client.clone();
                        runtime.spawn(async move {
                            let ApiRequest { id, call, reply_tx } = request;
                            let name = call.name();
                            let result = execute(&client, call).await;
                            if let Err(e) = &result {
                                warn!("Request {} ({}) failed: {}", id, name, e);
                            }
                            if reply_tx.send(ApiResponse { id, result }).is_err() {
                                debug!("Requester for {} ({}) is gone", id, name);
                            }
                        });
                    }
                    Err(_) => break,
                },
                recv(self.shutdown_rx) -> _ => break,
            }
        }

        runtime.shutdown_timeout(Duration::from_millis(500));
        info!("API worker stopped");
        Ok(())
    }
}

async fn execute(client: &ApiClient, call: ApiCall) -> Result<ApiReply> {
    match call {
        ApiCall::Upload { file_name, bytes } => {
            client.upload(&file_name, bytes).await.map(ApiReply::Uploaded)
        }
        ApiCall::Chat { message } => client.chat(&message).await.map(ApiReply::Chat),
        ApiCall::TutorQuestion => client.tutor_question().await.map(ApiReply::Question),
        ApiCall::Evaluate {
            question,
            user_answer,
        } => client
            .evaluate(&question, &user_answer)
            .await
            .map(ApiReply::Evaluation),
        ApiCall::Synthesize { text } => client.synthesize(&text).await.map(ApiReply::Speech),
        ApiCall::ConversationChat {
            session_id,
            message,
        } => client
            .conversation_chat(&session_id, &message)
            .await
            .map(ApiReply::Turn),
        ApiCall::ConversationQuestion { session_id, topic } => client
            .conversation_question(&session_id, topic.as_deref())
            .await
            .map(ApiReply::Turn),
        ApiCall::ResetSession { session_id } => client
            .reset_session(&session_id)
            .await
            .map(|_| ApiReply::SessionReset),
        ApiCall::Progress { session_id } => {
            client.progress(&session_id).await.map(ApiReply::Progress)
        }
        ApiCall::StartSession => client.start_session().await.map(ApiReply::Status),
        ApiCall::ClearDocument => client.clear_document().await.map(ApiReply::Status),
        ApiCall::DocumentStatus => client
            .document_status()
            .await
            .map(ApiReply::DocumentStatus),
        ApiCall::Health => client.health().await.map(ApiReply::Health),
        ApiCall::Transcribe { wav } => client.transcribe(wav).await.map(ApiReply::Transcript),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_handle_sees_requests() {
        let (handle, requests) = ApiHandle::detached();

        let id = handle.submit(ApiCall::TutorQuestion);
        let request = requests.try_recv().unwrap();
        assert_eq!(request.id, id);
        assert_eq!(request.call, ApiCall::TutorQuestion);

        assert!(request.respond(Ok(ApiReply::Question(TutorQuestion {
            question: "What is RAG?".into(),
        }))));

        let reply = handle.try_recv().unwrap();
        assert_eq!(reply.id, id);
        assert!(matches!(reply.result, Ok(ApiReply::Question(_))));
    }

    #[test]
    fn test_ids_are_unique_across_forks() {
        let (handle, _requests) = ApiHandle::detached();
        let fork = handle.fork();

        let a = handle.submit(ApiCall::Health);
        let b = fork.submit(ApiCall::Health);
        let c = handle.submit(ApiCall::Health);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_fork_has_own_mailbox() {
        let (handle, requests) = ApiHandle::detached();
        let fork = handle.fork();

        fork.submit(ApiCall::DocumentStatus);
        let request = requests.try_recv().unwrap();
        request.respond(Ok(ApiReply::DocumentStatus(DocumentStatus::default())));

        assert!(handle.try_recv().is_none());
        assert!(fork.try_recv().is_some());
    }

    #[test]
    fn test_submit_without_worker_replies_with_error() {
        let (handle, requests) = ApiHandle::detached();
        drop(requests);

        let id = handle.submit(ApiCall::Chat {
            message: "hi".into(),
        });
        let reply = handle.try_recv().unwrap();
        assert_eq!(reply.id, id);
        assert!(matches!(reply.result, Err(DocTutorError::ChannelError(_))));
    }

    #[test]
    fn test_worker_reports_unreachable_service() {
        let config = ApiConfig {
            // Reserved port on loopback; connection is refused immediately
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 5,
            ..Default::default()
        };
        let (handle, join) = ApiWorker::spawn(&config).unwrap();

        let id = handle.submit(ApiCall::Health);
        let reply = handle.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(reply.id, id);
        assert!(matches!(reply.result, Err(DocTutorError::Network(_))));

        handle.shutdown();
        join.join().unwrap();
    }
}
