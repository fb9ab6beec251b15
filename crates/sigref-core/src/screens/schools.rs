use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::controller::ScreenSource;
use crate::api::Backend;
use crate::cache::CachedData;
use crate::error::AppError;
use crate::models::School;
use crate::sync::MasterDataSync;

/// School selection: server-side search online, the master snapshot offline.
pub struct SchoolSearch {
    backend: Arc<dyn Backend>,
    master: MasterDataSync,
    query: RwLock<String>,
}

impl SchoolSearch {
    pub fn new(backend: Arc<dyn Backend>, master: MasterDataSync) -> Self {
        Self {
            backend,
            master,
            query: RwLock::new(String::new()),
        }
    }

    /// Change the search text. Takes effect on the next refresh.
    pub fn set_query(&self, query: &str) {
        if let Ok(mut current) = self.query.write() {
            *current = query.trim().to_string();
        }
    }

    pub fn query(&self) -> String {
        self.query.read().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ScreenSource for SchoolSearch {
    type Data = Vec<School>;

    fn load_cached(&self) -> Option<CachedData<Vec<School>>> {
        let snapshot = self.master.snapshot();
        if snapshot.schools.is_empty() {
            return None;
        }
        let cached_at = self.master.last_sync().unwrap_or_else(Utc::now);
        Some(CachedData::at(snapshot.search_schools(&self.query()), cached_at))
    }

    async fn fetch(&self, token: &str) -> Result<Vec<School>, AppError> {
        let query = self.query();
        Ok(self.backend.search_schools(token, &query).await?)
    }
}
