//! Chat view state: free-form questions answered from the document

use crate::api::{ApiCall, ApiHandle, ApiReply, RequestId};
use crate::messages::{Message, Transcript};
use tracing::{debug, warn};

/// Assistant turn shown when a chat request fails
pub const CHAT_ERROR_MESSAGE: &str = "Sorry, there was an error processing your message.";

pub struct ChatSession {
    api: ApiHandle,
    /// Text in the input box
    pub input: String,
    transcript: Transcript,
    pending: Option<RequestId>,
}

impl ChatSession {
    pub fn new(api: ApiHandle) -> Self {
        Self {
            api,
            input: String::new(),
            transcript: Transcript::new(),
            pending: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn can_send(&self) -> bool {
        !self.is_loading() && !self.input.trim().is_empty()
    }

    /// Send the input box contents
    ///
    /// Blank input and sends while a reply is outstanding are ignored.
    pub fn send(&mut self) -> bool {
        if !self.can_send() {
            return false;
        }

        let message = std::mem::take(&mut self.input);
        self.transcript.push(Message::user(message.clone()));
        self.pending = Some(self.api.submit(ApiCall::Chat { message }));
        true
    }

    /// Apply any finished chat reply
    pub fn poll(&mut self) -> bool {
        let mut changed = false;

        while let Some(response) = self.api.try_recv() {
            if self.pending != Some(response.id) {
                debug!("Dropping reply {} with no matching request", response.id);
                continue;
            }
            self.pending = None;
            changed = true;

            match response.result {
                Ok(ApiReply::Chat(reply)) => {
                    self.transcript
                        .push(Message::assistant_with_sources(reply.response, reply.sources));
                }
                Ok(other) => {
                    warn!("Unexpected reply to chat: {:?}", other);
                    self.transcript.push(Message::error(CHAT_ERROR_MESSAGE));
                }
                Err(e) => {
                    debug!("Chat failed: {}", e);
                    self.transcript.push(Message::error(CHAT_ERROR_MESSAGE));
                }
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChatResponse;
    use crate::messages::Role;
    use crate::DocTutorError;

    #[test]
    fn test_blank_input_not_sent() {
        let (api, requests) = ApiHandle::detached();
        let mut chat = ChatSession::new(api);

        chat.input = "   ".into();
        assert!(!chat.send());
        assert!(chat.transcript().is_empty());
        assert!(requests.try_recv().is_err());
    }

    #[test]
    fn test_reply_with_sources() {
        let (api, requests) = ApiHandle::detached();
        let mut chat = ChatSession::new(api);

        chat.input = "What is osmosis?".into();
        assert!(chat.send());
        assert!(chat.input.is_empty());
        assert!(chat.is_loading());

        let request = requests.try_recv().unwrap();
        assert_eq!(
            request.call,
            ApiCall::Chat {
                message: "What is osmosis?".into()
            }
        );
        request.respond(Ok(ApiReply::Chat(ChatResponse {
            response: "Diffusion of water.".into(),
            sources: vec!["Osmosis is the movement of water".into()],
        })));

        assert!(chat.poll());
        assert!(!chat.is_loading());
        let last = chat.transcript().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.sources.len(), 1);
        assert!(!last.is_error);
    }

    #[test]
    fn test_failure_appends_one_error_and_clears_loading() {
        let (api, requests) = ApiHandle::detached();
        let mut chat = ChatSession::new(api);

        chat.input = "Hello".into();
        chat.send();
        requests
            .try_recv()
            .unwrap()
            .respond(Err(DocTutorError::Network("timeout".into())));

        chat.poll();
        assert!(!chat.is_loading());
        assert_eq!(chat.transcript().len(), 2);
        let last = chat.transcript().last().unwrap();
        assert!(last.is_error);
        assert_eq!(last.text, CHAT_ERROR_MESSAGE);
    }

    #[test]
    fn test_no_second_send_while_loading() {
        let (api, requests) = ApiHandle::detached();
        let mut chat = ChatSession::new(api);

        chat.input = "first".into();
        chat.send();
        chat.input = "second".into();
        assert!(!chat.send());
        assert_eq!(chat.input, "second");
        assert_eq!(requests.try_iter().count(), 1);
    }
}
