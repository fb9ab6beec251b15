use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::api::Backend;
use crate::auth::TokenProvider;
use crate::connectivity::Connectivity;
use crate::error::AppError;
use crate::models::{
    Answer, AnswerValue, Question, QuestionnaireForm, SubmissionPayload, SubmitAck,
};
use crate::notice::{Notice, NoticeBus};
use crate::queue::PendingQueue;

/// How a submission ended up
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The server accepted the response
    Sent(SubmitAck),
    /// The response was queued on this device; carries its queue id
    SavedOffline(String),
}

/// Services a response needs to leave the device
#[derive(Clone)]
pub struct Submitter {
    pub backend: Arc<dyn Backend>,
    pub queue: PendingQueue,
    pub tokens: Arc<dyn TokenProvider>,
    pub connectivity: Connectivity,
    pub notices: NoticeBus,
}

/// Answers being filled in for one questionnaire at one school.
#[derive(Debug, Clone)]
pub struct QuestionnaireResponse {
    school_id: i64,
    questionnaire_id: i64,
    questions: Vec<Question>,
    answers: HashMap<i64, String>,
}

impl QuestionnaireResponse {
    pub fn new(school_id: i64, form: &QuestionnaireForm) -> Self {
        Self {
            school_id,
            questionnaire_id: form.questionnaire.id,
            questions: form.ordered_questions().into_iter().cloned().collect(),
            answers: HashMap::new(),
        }
    }

    /// Questions in display order
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Record raw input for a question. Input is checked on submit.
    pub fn set_answer(&mut self, question_id: i64, raw: impl Into<String>) -> Result<(), AppError> {
        if !self.questions.iter().any(|q| q.id == question_id) {
            return Err(AppError::validation(
                Some(question_id),
                format!("question {} is not part of this questionnaire", question_id),
            ));
        }
        self.answers.insert(question_id, raw.into());
        Ok(())
    }

    pub fn answer(&self, question_id: i64) -> Option<&str> {
        self.answers.get(&question_id).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.answers.clear();
    }

    /// (answered, total). Blank input does not count as answered.
    pub fn progress(&self) -> (usize, usize) {
        let answered = self
            .questions
            .iter()
            .filter(|q| {
                self.answers
                    .get(&q.id)
                    .is_some_and(|a| !a.trim().is_empty())
            })
            .count();
        (answered, self.questions.len())
    }

    /// Check every answer and build the payload to send
    pub fn validate(&self) -> Result<SubmissionPayload, AppError> {
        if self.questions.is_empty() {
            return Err(AppError::validation(None, "this questionnaire has no questions"));
        }
        let mut answers = Vec::with_capacity(self.questions.len());
        for question in &self.questions {
            let raw = self.answers.get(&question.id).map(String::as_str).unwrap_or("");
            if raw.trim().is_empty() {
                return Err(AppError::validation(
                    Some(question.id),
                    format!("'{}' needs an answer", question.text),
                ));
            }
            let value = AnswerValue::parse(question.kind, raw).map_err(|reason| {
                AppError::validation(Some(question.id), format!("'{}': {}", question.text, reason))
            })?;
            answers.push(Answer {
                question_id: question.id,
                value,
            });
        }
        Ok(SubmissionPayload {
            school_id: self.school_id,
            questionnaire_id: self.questionnaire_id,
            answers,
        })
    }

    /// Send the response, or queue it when the server cannot be reached.
    ///
    /// Offline responses are queued even without a session; they are sent
    /// with the next active token. Answers are cleared once the response
    /// is sent or safely queued.
    pub async fn submit(&mut self, via: &Submitter) -> Result<SubmitOutcome, AppError> {
        let payload = self.validate()?;
        let token = via
            .tokens
            .current_token()
            .filter(|t| !t.trim().is_empty());

        let outcome = if !via.connectivity.is_reachable() {
            save_offline(via, payload, token).await?
        } else {
            let token = token.ok_or(AppError::AuthMissing)?;
            let sent = via.backend.submit_answers(&token, &payload).await;
            match sent {
                Ok(ack) if ack.is_success() => {
                    info!(
                        school_id = self.school_id,
                        questionnaire_id = self.questionnaire_id,
                        "Response sent"
                    );
                    SubmitOutcome::Sent(ack)
                }
                Ok(ack) => {
                    let reason = ack.message.clone().unwrap_or_else(|| ack.status.clone());
                    warn!(reason = %reason, "Server rejected response");
                    return Err(AppError::Rejected(reason));
                }
                Err(e) if e.is_auth() => return Err(AppError::AuthRejected),
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Could not reach server, saving response offline");
                    save_offline(via, payload, Some(token)).await?
                }
                Err(e) => return Err(e.into()),
            }
        };

        self.clear();
        Ok(outcome)
    }
}

async fn save_offline(
    via: &Submitter,
    payload: SubmissionPayload,
    token: Option<String>,
) -> Result<SubmitOutcome, AppError> {
    let item = via.queue.new_submission(payload, token);
    let id = item.id.clone();
    if let Err(e) = via.queue.enqueue(item).await {
        via.notices.publish(Notice::PersistFailed(e.to_string()));
        return Err(e);
    }
    via.notices.publish(Notice::SavedOffline);
    Ok(SubmitOutcome::SavedOffline(id))
}
