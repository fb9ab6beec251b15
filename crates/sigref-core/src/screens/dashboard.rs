use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::controller::ScreenSource;
use crate::api::Backend;
use crate::cache::{CacheManager, CachedData};
use crate::error::AppError;
use crate::models::SchoolDashboard;

/// Gap and problem statistics for one school.
pub struct SchoolDashboardSource {
    school_id: i64,
    backend: Arc<dyn Backend>,
    cache: CacheManager,
}

impl SchoolDashboardSource {
    pub fn new(school_id: i64, backend: Arc<dyn Backend>, cache: CacheManager) -> Self {
        Self {
            school_id,
            backend,
            cache,
        }
    }
}

#[async_trait]
impl ScreenSource for SchoolDashboardSource {
    type Data = SchoolDashboard;

    fn load_cached(&self) -> Option<CachedData<SchoolDashboard>> {
        self.cache.load_school_dashboard(self.school_id)
    }

    async fn fetch(&self, token: &str) -> Result<SchoolDashboard, AppError> {
        let dashboard = self
            .backend
            .fetch_school_dashboard(token, self.school_id)
            .await?;
        if let Err(e) = self.cache.save_school_dashboard(self.school_id, &dashboard) {
            warn!(school_id = self.school_id, error = %e, "Failed to cache school dashboard");
        }
        Ok(dashboard)
    }
}
