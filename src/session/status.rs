//! Service status shown in the header
//!
//! Polls `/health` and `/document/status` on demand and clears the server's
//! document when the user starts over.

use crate::api::{ApiCall, ApiHandle, ApiReply, DocumentStatus, HealthStatus};
use crate::DocTutorError;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq)]
enum Reachability {
    Unknown,
    Online(HealthStatus),
    Offline,
}

pub struct ServiceStatus {
    api: ApiHandle,
    reachability: Reachability,
    document: Option<DocumentStatus>,
}

impl ServiceStatus {
    /// Create and send the first status checks
    pub fn new(api: ApiHandle) -> Self {
        let mut status = Self {
            api,
            reachability: Reachability::Unknown,
            document: None,
        };
        status.refresh();
        status
    }

    pub fn refresh(&mut self) {
        self.api.submit(ApiCall::Health);
        self.api.submit(ApiCall::DocumentStatus);
    }

    /// Drop the server's document, then re-check its status
    pub fn clear_document(&mut self) {
        info!("Clearing server document");
        self.document = None;
        self.api.submit(ApiCall::StartSession);
    }

    /// `None` until the first health check returns
    pub fn is_online(&self) -> Option<bool> {
        match self.reachability {
            Reachability::Unknown => None,
            Reachability::Online(_) => Some(true),
            Reachability::Offline => Some(false),
        }
    }

    /// The server already holds a processed document
    pub fn document_loaded(&self) -> bool {
        self.document.as_ref().is_some_and(|d| d.document_loaded)
    }

    pub fn chunk_count(&self) -> u32 {
        self.document.as_ref().map_or(0, |d| d.chunks_count)
    }

    /// One-line summary for the header
    pub fn summary(&self) -> String {
        match &self.reachability {
            Reachability::Unknown => "Connecting...".to_string(),
            Reachability::Offline => "Service offline".to_string(),
            Reachability::Online(health) if !health.is_healthy() => {
                format!("Service {}", health.status)
            }
            Reachability::Online(_) if self.document_loaded() => {
                format!("Service online · {} chunks loaded", self.chunk_count())
            }
            Reachability::Online(_) => "Service online".to_string(),
        }
    }

    pub fn poll(&mut self) -> bool {
        let mut changed = false;

        while let Some(response) = self.api.try_recv() {
            changed = true;
            match response.result {
                Ok(ApiReply::Health(health)) => {
                    debug!("Service health: {}", health.status);
                    self.reachability = Reachability::Online(health);
                }
                Ok(ApiReply::DocumentStatus(document)) => self.document = Some(document),
                Ok(ApiReply::Status(status)) => {
                    if !status.success {
                        warn!("Starting a new session failed: {}", status.message);
                    }
                    self.api.submit(ApiCall::DocumentStatus);
                }
                Ok(other) => debug!("Ignoring status reply {:?}", other),
                Err(DocTutorError::Network(e)) => {
                    debug!("Service unreachable: {}", e);
                    self.reachability = Reachability::Offline;
                }
                Err(e) => warn!("Status request failed: {}", e),
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiRequest, StatusMessage};
    use crossbeam_channel::Receiver;

    fn setup() -> (ServiceStatus, Receiver<ApiRequest>) {
        let (api, requests) = ApiHandle::detached();
        (ServiceStatus::new(api), requests)
    }

    #[test]
    fn test_initial_checks() {
        let (mut status, requests) = setup();
        assert_eq!(status.summary(), "Connecting...");

        let health = requests.try_recv().unwrap();
        let document = requests.try_recv().unwrap();
        assert_eq!(health.call, ApiCall::Health);
        assert_eq!(document.call, ApiCall::DocumentStatus);

        health.respond(Ok(ApiReply::Health(HealthStatus {
            status: "healthy".into(),
            document_loaded: true,
            chunks_count: 12,
        })));
        document.respond(Ok(ApiReply::DocumentStatus(DocumentStatus {
            document_loaded: true,
            chunks_count: 12,
            collection_exists: true,
            has_embeddings: 12,
        })));

        assert!(status.poll());
        assert_eq!(status.is_online(), Some(true));
        assert!(status.document_loaded());
        assert_eq!(status.summary(), "Service online · 12 chunks loaded");
    }

    #[test]
    fn test_unreachable_service() {
        let (mut status, requests) = setup();
        for request in requests.try_iter() {
            request.respond(Err(DocTutorError::Network("connection refused".into())));
        }

        status.poll();
        assert_eq!(status.is_online(), Some(false));
        assert_eq!(status.summary(), "Service offline");
    }

    #[test]
    fn test_clear_document_rechecks_status() {
        let (mut status, requests) = setup();
        requests.try_iter().for_each(drop);

        status.clear_document();
        let request = requests.try_recv().unwrap();
        assert_eq!(request.call, ApiCall::StartSession);
        request.respond(Ok(ApiReply::Status(StatusMessage {
            success: true,
            message: "New session started".into(),
        })));

        status.poll();
        assert_eq!(requests.try_recv().unwrap().call, ApiCall::DocumentStatus);
        assert!(!status.document_loaded());
    }
}
