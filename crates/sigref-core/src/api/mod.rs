//! REST API client module for the SIGREF server.
//!
//! This module provides the `ApiClient` for communicating with the
//! SIGREF Django API to fetch master data and screen payloads and to
//! submit questionnaire responses.
//!
//! The API uses DRF token authentication (`Authorization: Token <key>`)
//! obtained through the `/api/login/` endpoint.
//!
//! Services depend on the [`Backend`] trait rather than on `ApiClient`
//! directly, so the sync engine, queue and screens can run against an
//! in-memory backend in tests.

pub mod client;
pub mod error;
#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;

pub use client::ApiClient;
pub use error::{ApiError, ApiResult};

use crate::models::{
    MasterDataSnapshot, QuestionnaireForm, School, SchoolDashboard, SchoolQuestionnaires,
    SubmissionPayload, SubmitAck,
};

/// Server operations the offline client relies on.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Complete reference dataset
    async fn fetch_master_data(&self, token: &str) -> ApiResult<MasterDataSnapshot>;

    /// Server-side school search
    async fn search_schools(&self, token: &str, query: &str) -> ApiResult<Vec<School>>;

    async fn fetch_school_questionnaires(
        &self,
        token: &str,
        school_id: i64,
    ) -> ApiResult<SchoolQuestionnaires>;

    async fn fetch_questionnaire_form(
        &self,
        token: &str,
        school_id: i64,
        questionnaire_id: i64,
    ) -> ApiResult<QuestionnaireForm>;

    async fn fetch_school_dashboard(&self, token: &str, school_id: i64)
        -> ApiResult<SchoolDashboard>;

    async fn submit_answers(&self, token: &str, payload: &SubmissionPayload)
        -> ApiResult<SubmitAck>;
}
