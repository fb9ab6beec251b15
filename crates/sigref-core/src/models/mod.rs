//! Data models for SIGREF monitoring entities.
//!
//! This module contains the data structures exchanged with the SIGREF
//! server and kept in the local cache:
//!
//! - `School`, `Sector`: organizational reference data
//! - `Questionnaire`, `Question`, `AnswerValue`: monitoring forms and answers
//! - `MasterDataSnapshot`: the full reference dataset synced wholesale
//! - `PendingSubmission`: a locally queued questionnaire response
//! - `UserProfile`: the logged-in user returned by the login endpoint
//! - Screen payloads: `QuestionnaireForm`, `SchoolQuestionnaires`, `SchoolDashboard`
//!
//! Server field names are the Portuguese names used by the Django API;
//! they are mapped to English names with serde renames.

pub mod master;
pub mod questionnaire;
pub mod school;
pub mod screen;
pub mod submission;
pub mod user;

pub use master::MasterDataSnapshot;
pub use questionnaire::{Answer, AnswerKind, AnswerValue, Question, Questionnaire, YesNo};
pub use school::{School, Sector};
pub use screen::{
    QuestionnaireForm, QuestionnaireListing, SchoolDashboard, SchoolQuestionnaires,
    SchoolSummary, SubmitAck,
};
pub use submission::{PendingSubmission, SubmissionPayload};
pub use user::UserProfile;
