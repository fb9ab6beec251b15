//! Application wiring: one place that builds every service and owns the
//! background tasks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, Backend};
use crate::auth::{SessionHandle, TokenProvider};
use crate::cache::{CacheManager, FileStore, LocalStore, Vault};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::connectivity::{Connectivity, Reachability};
use crate::error::AppError;
use crate::models::UserProfile;
use crate::notice::NoticeBus;
use crate::queue::{PendingQueue, QueueProcessor, QueueProcessorHandle};
use crate::screens::{
    QueueAccess, QuestionnaireFormSource, QuestionnaireList, SchoolDashboardSource, SchoolSearch,
    ScreenController, ScreenSource, Submitter,
};
use crate::sync::{MasterDataSync, SyncScheduler};

/// How often the background probe checks the server
pub const PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Every service of the client, shared by the screens.
pub struct AppContext {
    config: Config,
    api: Arc<ApiClient>,
    cache: CacheManager,
    connectivity: Connectivity,
    notices: NoticeBus,
    session: SessionHandle,
    master: MasterDataSync,
    queue: PendingQueue,
    tasks: Vec<JoinHandle<()>>,
    processor: Option<QueueProcessorHandle>,
}

impl AppContext {
    /// Build the services and start the background tasks.
    pub fn start(config: Config) -> Result<Self> {
        let mut ctx = Self::open(config)?;
        ctx.start_services();
        Ok(ctx)
    }

    /// Build the services over the on-disk cache, without starting tasks.
    pub fn open(config: Config) -> Result<Self> {
        let cache_dir = config
            .cache_dir()
            .unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_dir, "Cache directory configured");
        let store = open_store(cache_dir, config.encrypt_cache)?;
        Self::with_store(config, store)
    }

    /// Build the services over any store
    pub fn with_store(config: Config, store: Arc<dyn LocalStore>) -> Result<Self> {
        let api = Arc::new(ApiClient::new(
            config.api_base_url.clone(),
            config.request_timeout(),
        )?);
        let cache = CacheManager::new(store);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let connectivity = Connectivity::default();
        let session = SessionHandle::restore(cache.clone());

        let backend: Arc<dyn Backend> = api.clone();
        let master = MasterDataSync::new(
            backend,
            cache.clone(),
            connectivity.clone(),
            clock.clone(),
            config.sync_interval(),
        );
        if master.load_cached() {
            debug!(last_sync = ?master.last_sync(), "Master data loaded from cache");
        }
        let queue = PendingQueue::new(cache.clone(), clock);

        Ok(Self {
            config,
            api,
            cache,
            connectivity,
            notices: NoticeBus::new(),
            session,
            master,
            queue,
            tasks: Vec::new(),
            processor: None,
        })
    }

    /// Spawn the reachability probe, the sync scheduler and the queue
    /// processor. Calling it again while they run does nothing.
    pub fn start_services(&mut self) {
        if !self.tasks.is_empty() {
            return;
        }
        info!(api = %self.config.api_base_url, "Starting background services");
        self.tasks.push(
            self.connectivity
                .spawn_probe(self.config.api_base_url.clone(), PROBE_INTERVAL),
        );
        self.tasks.push(
            SyncScheduler::new(
                self.master.clone(),
                self.connectivity.clone(),
                self.tokens(),
                self.notices.clone(),
            )
            .spawn(),
        );
        self.processor = Some(
            QueueProcessor::new(
                self.queue.clone(),
                self.backend(),
                self.tokens(),
                self.connectivity.clone(),
                self.notices.clone(),
            )
            .spawn(),
        );
    }

    /// Stop every background task
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(processor) = self.processor.take() {
            processor.abort();
        }
        debug!("Background services stopped");
    }

    /// Probe the server once, outside the background probe
    pub async fn check_connectivity(&self) -> Reachability {
        self.connectivity.check(&self.config.api_base_url).await
    }

    /// Ask the queue processor for a drain. No-op before `start_services`.
    pub fn request_drain(&self) {
        if let Some(processor) = &self.processor {
            processor.trigger();
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile, AppError> {
        let user = self
            .session
            .login(&self.api, &self.connectivity, username, password)
            .await?;
        self.request_drain();
        Ok(user)
    }

    /// End the session. Queued responses stay on the device.
    pub fn logout(&self) -> Result<(), AppError> {
        self.session.sign_out()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        self.api.clone()
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn notices(&self) -> &NoticeBus {
        &self.notices
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn tokens(&self) -> Arc<dyn TokenProvider> {
        Arc::new(self.session.clone())
    }

    pub fn master(&self) -> &MasterDataSync {
        &self.master
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn submitter(&self) -> Submitter {
        Submitter {
            backend: self.backend(),
            queue: self.queue.clone(),
            tokens: self.tokens(),
            connectivity: self.connectivity.clone(),
            notices: self.notices.clone(),
        }
    }

    fn screen<S: ScreenSource>(&self, source: S) -> ScreenController<S> {
        ScreenController::new(
            source,
            self.tokens(),
            self.connectivity.clone(),
            self.notices.clone(),
        )
    }

    pub fn school_search(&self) -> ScreenController<SchoolSearch> {
        self.screen(SchoolSearch::new(self.backend(), self.master.clone()))
    }

    pub fn questionnaire_list(&self, school_id: i64) -> ScreenController<QuestionnaireList> {
        let pending = QueueAccess {
            queue: self.queue.clone(),
            tokens: self.tokens(),
            connectivity: self.connectivity.clone(),
            notices: self.notices.clone(),
        };
        self.screen(QuestionnaireList::new(
            school_id,
            self.backend(),
            self.cache.clone(),
            self.master.clone(),
            pending,
        ))
    }

    pub fn questionnaire_form(
        &self,
        school_id: i64,
        questionnaire_id: i64,
    ) -> ScreenController<QuestionnaireFormSource> {
        self.screen(QuestionnaireFormSource::new(
            school_id,
            questionnaire_id,
            self.backend(),
            self.cache.clone(),
            self.master.clone(),
        ))
    }

    pub fn school_dashboard(&self, school_id: i64) -> ScreenController<SchoolDashboardSource> {
        self.screen(SchoolDashboardSource::new(
            school_id,
            self.backend(),
            self.cache.clone(),
        ))
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Open the file store, encrypted when asked and the keychain allows it.
fn open_store(cache_dir: PathBuf, encrypt: bool) -> Result<Arc<dyn LocalStore>> {
    if encrypt {
        match Vault::for_device(&cache_dir) {
            Ok(vault) => return Ok(Arc::new(FileStore::encrypted(cache_dir, vault)?)),
            Err(e) => {
                warn!(error = %e, "Cache encryption unavailable, storing cache unencrypted");
            }
        }
    }
    Ok(Arc::new(FileStore::new(cache_dir)?))
}
