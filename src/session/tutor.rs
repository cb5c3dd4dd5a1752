//! Tutor view state: one generated question, one answer, one evaluation

use crate::api::{ApiCall, ApiHandle, ApiReply, Evaluation, RequestId};
use tracing::{debug, warn};

/// Question text shown when fetching a question fails
pub const QUESTION_ERROR_MESSAGE: &str = "Error loading question. Please try again.";

/// Visual tier for a 0-10 score
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreTier {
    High,
    Medium,
    Low,
}

impl ScoreTier {
    /// 8 and 6 are the inclusive lower bounds of High and Medium
    pub fn for_score(score: u8) -> Self {
        if score >= 8 {
            ScoreTier::High
        } else if score >= 6 {
            ScoreTier::Medium
        } else {
            ScoreTier::Low
        }
    }
}

pub struct TutorSession {
    api: ApiHandle,
    question: String,
    /// Text in the answer box
    pub answer: String,
    evaluation: Option<Evaluation>,
    question_request: Option<RequestId>,
    evaluate_request: Option<RequestId>,
}

impl TutorSession {
    /// Create the session and request the first question
    pub fn new(api: ApiHandle) -> Self {
        let mut session = Self {
            api,
            question: String::new(),
            answer: String::new(),
            evaluation: None,
            question_request: None,
            evaluate_request: None,
        };
        session.new_question();
        session
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    pub fn score_tier(&self) -> Option<ScoreTier> {
        self.evaluation.as_ref().map(|e| ScoreTier::for_score(e.score))
    }

    pub fn is_question_loading(&self) -> bool {
        self.question_request.is_some()
    }

    pub fn is_evaluating(&self) -> bool {
        self.evaluate_request.is_some()
    }

    pub fn can_submit(&self) -> bool {
        !self.is_evaluating()
            && !self.is_question_loading()
            && self.evaluation.is_none()
            && !self.answer.trim().is_empty()
    }

    /// Fetch a fresh question, clearing the answer and evaluation
    pub fn new_question(&mut self) {
        self.evaluation = None;
        self.answer.clear();
        // Any outstanding evaluation belongs to the old question
        self.evaluate_request = None;
        self.question_request = Some(self.api.submit(ApiCall::TutorQuestion));
    }

    /// Submit the answer for evaluation; blank answers are ignored
    pub fn submit(&mut self) -> bool {
        if !self.can_submit() {
            return false;
        }
        self.evaluate_request = Some(self.api.submit(ApiCall::Evaluate {
            question: self.question.clone(),
            user_answer: self.answer.clone(),
        }));
        true
    }

    /// Apply any finished question or evaluation reply
    pub fn poll(&mut self) -> bool {
        let mut changed = false;

        while let Some(response) = self.api.try_recv() {
            if self.question_request == Some(response.id) {
                self.question_request = None;
                changed = true;
                self.question = match response.result {
                    Ok(ApiReply::Question(q)) => q.question,
                    Ok(other) => {
                        warn!("Unexpected reply to question: {:?}", other);
                        QUESTION_ERROR_MESSAGE.to_string()
                    }
                    Err(e) => {
                        debug!("Question fetch failed: {}", e);
                        QUESTION_ERROR_MESSAGE.to_string()
                    }
                };
            } else if self.evaluate_request == Some(response.id) {
                self.evaluate_request = None;
                changed = true;
                self.evaluation = Some(match response.result {
                    Ok(ApiReply::Evaluation(eval)) => eval,
                    Ok(other) => {
                        warn!("Unexpected reply to evaluate: {:?}", other);
                        Evaluation::unavailable()
                    }
                    Err(e) => {
                        debug!("Evaluation failed: {}", e);
                        Evaluation::unavailable()
                    }
                });
            } else {
                debug!("Dropping stale tutor reply {}", response.id);
            }
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiRequest, TutorQuestion};
    use crate::DocTutorError;
    use crossbeam_channel::Receiver;

    fn with_question(text: &str) -> (TutorSession, Receiver<ApiRequest>) {
        let (api, requests) = ApiHandle::detached();
        let mut tutor = TutorSession::new(api);
        let request = requests.try_recv().unwrap();
        assert_eq!(request.call, ApiCall::TutorQuestion);
        request.respond(Ok(ApiReply::Question(TutorQuestion {
            question: text.into(),
        })));
        tutor.poll();
        (tutor, requests)
    }

    #[test]
    fn test_score_tiers() {
        assert_eq!(ScoreTier::for_score(10), ScoreTier::High);
        assert_eq!(ScoreTier::for_score(8), ScoreTier::High);
        assert_eq!(ScoreTier::for_score(7), ScoreTier::Medium);
        assert_eq!(ScoreTier::for_score(6), ScoreTier::Medium);
        assert_eq!(ScoreTier::for_score(5), ScoreTier::Low);
        assert_eq!(ScoreTier::for_score(0), ScoreTier::Low);
    }

    #[test]
    fn test_fetches_question_on_creation() {
        let (tutor, _requests) = with_question("Define entropy.");
        assert_eq!(tutor.question(), "Define entropy.");
        assert!(!tutor.is_question_loading());
    }

    #[test]
    fn test_question_failure_message() {
        let (api, requests) = ApiHandle::detached();
        let mut tutor = TutorSession::new(api);
        requests
            .try_recv()
            .unwrap()
            .respond(Err(DocTutorError::Backend {
                status: 400,
                detail: Some("Please upload a document first".into()),
            }));
        tutor.poll();
        assert_eq!(tutor.question(), QUESTION_ERROR_MESSAGE);
        assert!(!tutor.is_question_loading());
    }

    #[test]
    fn test_evaluation_flow() {
        let (mut tutor, requests) = with_question("Define entropy.");

        assert!(!tutor.submit());
        tutor.answer = "Disorder of a system".into();
        assert!(tutor.submit());
        assert!(tutor.is_evaluating());

        let request = requests.try_recv().unwrap();
        assert_eq!(
            request.call,
            ApiCall::Evaluate {
                question: "Define entropy.".into(),
                user_answer: "Disorder of a system".into()
            }
        );
        request.respond(Ok(ApiReply::Evaluation(Evaluation {
            score: 7,
            correct_points: vec!["Mentions disorder".into()],
            missing_points: vec!["Second law".into()],
            improved_answer: "Entropy measures...".into(),
        })));

        tutor.poll();
        assert!(!tutor.is_evaluating());
        assert_eq!(tutor.score_tier(), Some(ScoreTier::Medium));
        assert!(!tutor.submit());
    }

    #[test]
    fn test_evaluation_failure_uses_fallback() {
        let (mut tutor, requests) = with_question("Q");
        tutor.answer = "A".into();
        tutor.submit();
        requests
            .try_recv()
            .unwrap()
            .respond(Err(DocTutorError::Network("reset".into())));

        tutor.poll();
        assert!(!tutor.is_evaluating());
        assert_eq!(tutor.evaluation(), Some(&Evaluation::unavailable()));
        assert_eq!(tutor.score_tier(), Some(ScoreTier::Low));
    }

    #[test]
    fn test_new_question_clears_state() {
        let (mut tutor, requests) = with_question("Q1");
        tutor.answer = "A".into();
        tutor.submit();
        let eval_request = requests.try_recv().unwrap();

        tutor.new_question();
        assert!(tutor.answer.is_empty());
        assert!(tutor.evaluation().is_none());

        // Late evaluation for the previous question is ignored
        eval_request.respond(Ok(ApiReply::Evaluation(Evaluation::default())));
        tutor.poll();
        assert!(tutor.evaluation().is_none());
    }
}
