use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Answer;

/// Body of a questionnaire response POST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    #[serde(rename = "escola_id")]
    pub school_id: i64,
    #[serde(rename = "questionario_id")]
    pub questionnaire_id: i64,
    #[serde(rename = "respostas")]
    pub answers: Vec<Answer>,
}

/// A questionnaire response waiting to be delivered.
///
/// Immutable once created; removed from the queue only after the server
/// confirmed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub payload: SubmissionPayload,
    /// Token of the session that created the submission
    pub auth_token: Option<String>,
}

impl PendingSubmission {
    /// Build a submission with a time-based id. `seq` disambiguates ids
    /// created within the same nanosecond.
    pub fn new(
        payload: SubmissionPayload,
        auth_token: Option<String>,
        now: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_millis().saturating_mul(1_000_000));
        Self {
            id: format!("{}-{}", nanos, seq),
            created_at: now,
            payload,
            auth_token,
        }
    }
}
