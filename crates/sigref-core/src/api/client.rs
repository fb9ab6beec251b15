//! API client for communicating with the SIGREF REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! API requests to fetch monitoring data and submit responses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{
    MasterDataSnapshot, QuestionnaireForm, School, SchoolDashboard, SchoolQuestionnaires,
    SubmissionPayload, SubmitAck, UserProfile,
};

use super::{ApiError, ApiResult, Backend};

// ============================================================================
// Constants
// ============================================================================

/// Default server base URL
pub const DEFAULT_API_BASE_URL: &str = "https://grefloresta.com.br";

/// HTTP request timeout in seconds.
/// Master data downloads are large; 30s matches what the mobile app allowed.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Envelope of the login response; the profile fields sit beside it.
#[derive(Debug, Deserialize)]
struct LoginOutcome {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// API client for the SIGREF server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    initial_backoff_ms: u64,
}

impl ApiClient {
    /// Create a new API client for the given server
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            initial_backoff_ms: INITIAL_BACKOFF_MS,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Shorten the rate-limit backoff, for tests
    #[cfg(test)]
    fn with_backoff_ms(mut self, ms: u64) -> Self {
        self.initial_backoff_ms = ms;
        self
    }

    /// Authenticate with username/password and return the user profile
    pub async fn authenticate(&self, username: &str, password: &str) -> ApiResult<UserProfile> {
        let url = format!("{}/api/login/", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        let body = response.text().await.map_err(Self::classify)?;

        // The login view reports bad credentials in the body, sometimes with a 4xx
        let outcome = serde_json::from_str::<LoginOutcome>(&body).ok();
        if status.is_success() {
            match outcome {
                Some(o) if o.success => serde_json::from_str::<UserProfile>(&body).map_err(|e| {
                    ApiError::InvalidResponse(format!("Failed to parse login response: {}", e))
                }),
                Some(o) => Err(ApiError::LoginRefused(
                    o.message.unwrap_or_else(|| "Invalid username or password".to_string()),
                )),
                None => Err(ApiError::InvalidResponse(
                    "Unexpected login response".to_string(),
                )),
            }
        } else {
            match outcome {
                Some(LoginOutcome {
                    success: false,
                    message: Some(message),
                }) if status.is_client_error() => Err(ApiError::LoginRefused(message)),
                _ => Err(ApiError::from_status(status, &body)),
            }
        }
    }

    fn auth_headers(token: &str) -> ApiResult<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|e| ApiError::InvalidResponse(format!("Invalid token: {}", e)))?,
        );
        Ok(headers)
    }

    /// Map a transport error, separating timeouts from other failures
    fn classify(err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::NetworkError(err)
        }
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> ApiResult<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> ApiResult<T> {
        let text = response.text().await.map_err(Self::classify)?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    async fn backoff(&self, url: &str, retries: &mut u32, backoff_ms: &mut u64) -> ApiResult<()> {
        *retries += 1;
        if *retries > MAX_RATE_LIMIT_RETRIES {
            return Err(ApiError::RateLimited);
        }
        warn!(url = url, retry = *retries, backoff_ms = *backoff_ms, "Rate limited, backing off");
        tokio::time::sleep(Duration::from_millis(*backoff_ms)).await;
        *backoff_ms *= 2; // Exponential backoff
        Ok(())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        token: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> ApiResult<T> {
        let mut retries = 0;
        let mut backoff_ms = self.initial_backoff_ms;

        loop {
            let response = self
                .client
                .get(url)
                .headers(Self::auth_headers(token)?)
                .query(query)
                .send()
                .await
                .map_err(Self::classify)?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Self::parse_json(response, url).await,
                None => self.backoff(url, &mut retries, &mut backoff_ms).await?,
            }
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        token: &str,
        url: &str,
        body: &B,
    ) -> ApiResult<T> {
        let mut retries = 0;
        let mut backoff_ms = self.initial_backoff_ms;

        loop {
            let response = self
                .client
                .post(url)
                .headers(Self::auth_headers(token)?)
                .json(body)
                .send()
                .await
                .map_err(Self::classify)?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Self::parse_json(response, url).await,
                None => self.backoff(url, &mut retries, &mut backoff_ms).await?,
            }
        }
    }

    fn responder_url(&self, school_id: i64, questionnaire_id: i64) -> String {
        format!(
            "{}/monitoramento/api/escola/{}/questionario/{}/responder/",
            self.base_url, school_id, questionnaire_id
        )
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn fetch_master_data(&self, token: &str) -> ApiResult<MasterDataSnapshot> {
        let url = format!("{}/monitoramento/api/all-offline-data/", self.base_url);
        let snapshot: MasterDataSnapshot = self.get(token, &url, &[]).await?;
        debug!(
            schools = snapshot.schools.len(),
            questionnaires = snapshot.questionnaires.len(),
            questions = snapshot.questions.len(),
            sectors = snapshot.sectors.len(),
            "Master data received"
        );
        Ok(snapshot)
    }

    async fn search_schools(&self, token: &str, query: &str) -> ApiResult<Vec<School>> {
        let url = format!("{}/monitoramento/api/escolas-selection/", self.base_url);
        self.get(token, &url, &[("q", query)]).await
    }

    async fn fetch_school_questionnaires(
        &self,
        token: &str,
        school_id: i64,
    ) -> ApiResult<SchoolQuestionnaires> {
        let url = format!(
            "{}/monitoramento/api/escola/{}/questionarios/",
            self.base_url, school_id
        );
        self.get(token, &url, &[]).await
    }

    async fn fetch_questionnaire_form(
        &self,
        token: &str,
        school_id: i64,
        questionnaire_id: i64,
    ) -> ApiResult<QuestionnaireForm> {
        let url = self.responder_url(school_id, questionnaire_id);
        self.get(token, &url, &[]).await
    }

    async fn fetch_school_dashboard(
        &self,
        token: &str,
        school_id: i64,
    ) -> ApiResult<SchoolDashboard> {
        let url = format!(
            "{}/monitoramento/api/escola-dashboard/{}/",
            self.base_url, school_id
        );
        self.get(token, &url, &[]).await
    }

    async fn submit_answers(
        &self,
        token: &str,
        payload: &SubmissionPayload,
    ) -> ApiResult<SubmitAck> {
        let url = self.responder_url(payload.school_id, payload.questionnaire_id);
        let ack: SubmitAck = self.post(token, &url, payload).await?;
        debug!(status = %ack.status, "Submission acknowledged");
        Ok(ack)
    }
}

// ============================================================================
// Tests
// ============================================================================
