//! User-facing error kinds.
//!
//! Network and storage failures are converted into an [`AppError`] at the
//! point of the asynchronous operation. Screens only ever see these kinds,
//! never raw transport errors, and none of them is fatal to the process.

use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// No token available where one is required. Send the user to login.
    #[error("Not signed in - please log in")]
    AuthMissing,

    /// The server rejected a previously valid token.
    #[error("Session expired or access denied - please log in again")]
    AuthRejected,

    /// No confirmed connectivity. Cached data can still be displayed.
    #[error("You are offline")]
    NetworkUnreachable,

    /// A fetch was attempted but did not complete. Previous cache retained.
    #[error("Sync failed: {0}")]
    SyncFailed(String),

    /// Local input does not satisfy a question's required shape.
    #[error("Invalid answer: {reason}")]
    ValidationFailed { question_id: Option<i64>, reason: String },

    /// A local storage write did not complete; data may be lost.
    #[error("Could not save locally: {0}")]
    PersistFailed(String),

    /// The server answered but declined the submission.
    #[error("Server rejected the submission: {0}")]
    Rejected(String),
}

impl AppError {
    pub fn validation(question_id: Option<i64>, reason: impl Into<String>) -> Self {
        AppError::ValidationFailed {
            question_id,
            reason: reason.into(),
        }
    }

    pub fn persist(err: impl std::fmt::Display) -> Self {
        AppError::PersistFailed(err.to_string())
    }

    /// Errors that should send the user back to the login screen
    pub fn requires_login(&self) -> bool {
        matches!(self, AppError::AuthMissing | AppError::AuthRejected)
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized | ApiError::AccessDenied(_) => AppError::AuthRejected,
            ApiError::LoginRefused(msg) => AppError::Rejected(msg),
            ApiError::NetworkError(ref e) if e.is_connect() => AppError::NetworkUnreachable,
            other => AppError::SyncFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_map_to_rejected() {
        assert_eq!(AppError::from(ApiError::Unauthorized), AppError::AuthRejected);
        assert_eq!(
            AppError::from(ApiError::AccessDenied("no".into())),
            AppError::AuthRejected
        );
    }

    #[test]
    fn test_other_errors_map_to_sync_failed() {
        let err = AppError::from(ApiError::Timeout);
        assert!(matches!(err, AppError::SyncFailed(ref msg) if msg.contains("timed out")));
    }

    #[test]
    fn test_requires_login() {
        assert!(AppError::AuthMissing.requires_login());
        assert!(AppError::AuthRejected.requires_login());
        assert!(!AppError::NetworkUnreachable.requires_login());
    }

    #[test]
    fn test_validation_display() {
        let err = AppError::validation(Some(7), "question 7 needs an answer");
        assert_eq!(err.to_string(), "Invalid answer: question 7 needs an answer");
    }
}
