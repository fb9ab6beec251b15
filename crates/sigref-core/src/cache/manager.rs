use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::store::LocalStore;
use crate::models::{
    MasterDataSnapshot, PendingSubmission, QuestionnaireForm, SchoolDashboard,
    SchoolQuestionnaires, UserProfile,
};

/// Screen caches older than this are shown with a stale marker.
const SCREEN_STALE_MINUTES: i64 = 60;

const MASTER_DATA_KEY: &str = "offline_master_data";
const SYNC_METADATA_KEY: &str = "sync_metadata";
const PENDING_KEY: &str = "pending_submissions";
const USER_KEY: &str = "user_data";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self::at(data, Utc::now())
    }

    pub fn at(data: T, cached_at: DateTime<Utc>) -> Self {
        Self { data, cached_at }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        format_age(self.age_minutes())
    }

    pub fn is_older_than(&self, max_age: Duration) -> bool {
        Utc::now() - self.cached_at > max_age
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > SCREEN_STALE_MINUTES
    }
}

/// Render an age in minutes as "just now", "5m ago", "2h ago" or "3d ago"
pub fn format_age(minutes: i64) -> String {
    if minutes < 1 {
        // Clock skew shows as negative ages
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// Bookkeeping of the master data sync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Last time a sync was attempted, successful or not
    pub last_attempt: Option<DateTime<Utc>>,
    /// Last time a snapshot was accepted from the server
    pub last_success: Option<DateTime<Utc>>,
}

/// Typed JSON entries over a [`LocalStore`].
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn LocalStore>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let Some(bytes) = self.store.get(name)? else {
            return Ok(None);
        };
        let cached: CachedData<T> = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse cache entry: {}", name))?;
        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let bytes = serde_json::to_vec(&cached)
            .with_context(|| format!("Failed to serialize cache entry: {}", name))?;
        self.store.put(name, &bytes)
    }

    /// Load an entry, logging and treating failures as a miss
    fn load_or_miss<T: DeserializeOwned>(&self, name: &str) -> Option<CachedData<T>> {
        match self.load(name) {
            Ok(cached) => cached,
            Err(e) => {
                debug!(cache = name, error = %e, "Failed to load cache entry, treating as miss");
                None
            }
        }
    }

    // ===== Master data =====

    pub fn load_master_data(&self) -> Result<Option<CachedData<MasterDataSnapshot>>> {
        self.load(MASTER_DATA_KEY)
    }

    pub fn save_master_data(&self, snapshot: &MasterDataSnapshot) -> Result<()> {
        self.save(MASTER_DATA_KEY, snapshot)
    }

    // ===== Sync metadata =====

    pub fn load_sync_metadata(&self) -> SyncMetadata {
        self.load_or_miss::<SyncMetadata>(SYNC_METADATA_KEY)
            .map(|c| c.data)
            .unwrap_or_default()
    }

    pub fn save_sync_metadata(&self, meta: &SyncMetadata) -> Result<()> {
        self.save(SYNC_METADATA_KEY, meta)
    }

    // ===== Pending submissions =====

    /// Unlike screen caches, a corrupt queue is an error rather than a miss,
    /// so that callers never overwrite undelivered submissions.
    pub fn load_pending(&self) -> Result<Vec<PendingSubmission>> {
        Ok(self
            .load::<Vec<PendingSubmission>>(PENDING_KEY)?
            .map(|c| c.data)
            .unwrap_or_default())
    }

    pub fn save_pending(&self, items: &[PendingSubmission]) -> Result<()> {
        self.save(PENDING_KEY, &items)
    }

    // ===== User session =====

    pub fn load_user(&self) -> Option<UserProfile> {
        self.load_or_miss::<UserProfile>(USER_KEY).map(|c| c.data)
    }

    pub fn save_user(&self, user: &UserProfile) -> Result<()> {
        self.save(USER_KEY, user)
    }

    pub fn clear_user(&self) -> Result<()> {
        self.store.remove(USER_KEY)
    }

    // ===== Screen caches =====

    pub fn load_questionnaire_form(
        &self,
        questionnaire_id: i64,
    ) -> Option<CachedData<QuestionnaireForm>> {
        self.load_or_miss(&format!("questionnaire_form_{}", questionnaire_id))
    }

    pub fn save_questionnaire_form(&self, questionnaire_id: i64, form: &QuestionnaireForm) -> Result<()> {
        self.save(&format!("questionnaire_form_{}", questionnaire_id), form)
    }

    pub fn load_school_questionnaires(
        &self,
        school_id: i64,
    ) -> Option<CachedData<SchoolQuestionnaires>> {
        self.load_or_miss(&format!("school_questionnaires_{}", school_id))
    }

    pub fn save_school_questionnaires(
        &self,
        school_id: i64,
        listing: &SchoolQuestionnaires,
    ) -> Result<()> {
        self.save(&format!("school_questionnaires_{}", school_id), listing)
    }

    pub fn load_school_dashboard(&self, school_id: i64) -> Option<CachedData<SchoolDashboard>> {
        self.load_or_miss(&format!("school_dashboard_{}", school_id))
    }

    pub fn save_school_dashboard(&self, school_id: i64, dashboard: &SchoolDashboard) -> Result<()> {
        self.save(&format!("school_dashboard_{}", school_id), dashboard)
    }

    // ===== Cache age information =====

    pub fn get_cache_ages(&self) -> CacheAges {
        CacheAges {
            master_data: self
                .load_or_miss::<MasterDataSnapshot>(MASTER_DATA_KEY)
                .map(|c| c.age_display()),
            last_sync: self
                .load_sync_metadata()
                .last_success
                .map(|t| format_age((Utc::now() - t).num_minutes())),
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheAges {
    pub master_data: Option<String>,
    pub last_sync: Option<String>,
}

impl CacheAges {
    pub fn last_updated(&self) -> String {
        self.last_sync
            .clone()
            .or_else(|| self.master_data.clone())
            .unwrap_or_else(|| "never".to_string())
    }
}
