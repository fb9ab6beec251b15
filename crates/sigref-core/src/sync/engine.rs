use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::cache::{CacheManager, SyncMetadata};
use crate::clock::Clock;
use crate::connectivity::Connectivity;
use crate::error::AppError;
use crate::models::MasterDataSnapshot;

type SyncResult = Result<Arc<MasterDataSnapshot>, AppError>;
type InFlight = Shared<BoxFuture<'static, SyncResult>>;

/// Outcome of [`MasterDataSync::sync_if_due`]
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    /// A sync ran and replaced the snapshot
    Synced,
    /// The last attempt is recent enough; nothing was fetched
    Fresh,
}

struct Inner {
    backend: Arc<dyn Backend>,
    cache: CacheManager,
    connectivity: Connectivity,
    clock: Arc<dyn Clock>,
    interval: Duration,
    snapshot: RwLock<Arc<MasterDataSnapshot>>,
    meta: Mutex<SyncMetadata>,
    in_flight: Mutex<Option<InFlight>>,
}

/// Keeps the local master data snapshot in step with the server.
///
/// The snapshot is replaced wholesale, and only after the new one has been
/// written to the cache. A failed sync never touches it.
#[derive(Clone)]
pub struct MasterDataSync {
    inner: Arc<Inner>,
}

impl MasterDataSync {
    pub fn new(
        backend: Arc<dyn Backend>,
        cache: CacheManager,
        connectivity: Connectivity,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                cache,
                connectivity,
                clock,
                interval,
                snapshot: RwLock::new(Arc::new(MasterDataSnapshot::default())),
                meta: Mutex::new(SyncMetadata::default()),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Restore the snapshot and sync bookkeeping from the cache.
    /// Returns whether a cached snapshot was found.
    pub fn load_cached(&self) -> bool {
        let meta = self.inner.cache.load_sync_metadata();
        if let Ok(mut current) = self.inner.meta.lock() {
            *current = meta;
        }
        match self.inner.cache.load_master_data() {
            Ok(Some(cached)) => {
                info!(
                    schools = cached.data.schools.len(),
                    age = %cached.age_display(),
                    "Loaded cached master data"
                );
                self.inner.replace_snapshot(Arc::new(cached.data));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to load cached master data");
                false
            }
        }
    }

    pub fn snapshot(&self) -> Arc<MasterDataSnapshot> {
        self.inner.current_snapshot()
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.inner.meta.lock().ok().and_then(|m| m.last_success)
    }

    pub fn last_attempt(&self) -> Option<DateTime<Utc>> {
        self.inner.meta.lock().ok().and_then(|m| m.last_attempt)
    }

    /// Whether the last attempt is older than the sync interval
    pub fn is_due(&self) -> bool {
        match self.last_attempt() {
            None => true,
            Some(at) => self.inner.clock.now() - at >= self.inner.interval,
        }
    }

    /// Fetch the master data now.
    ///
    /// Calls made while a sync is running wait for that sync instead of
    /// starting another request.
    pub async fn sync(&self, token: Option<&str>) -> SyncResult {
        let token = match token.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(AppError::AuthMissing),
        };
        if !self.inner.connectivity.is_reachable() {
            return Err(AppError::NetworkUnreachable);
        }

        let run = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .map_err(|_| AppError::SyncFailed("sync state poisoned".to_string()))?;
            match slot.as_ref() {
                Some(running) => {
                    debug!("Joining sync already in flight");
                    running.clone()
                }
                None => {
                    let inner = self.inner.clone();
                    let run = async move {
                        let result = inner.run(&token).await;
                        if let Ok(mut slot) = inner.in_flight.lock() {
                            *slot = None;
                        }
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(run.clone());
                    run
                }
            }
        };
        run.await
    }

    /// Sync only if never attempted or the interval has passed
    pub async fn sync_if_due(&self, token: Option<&str>) -> Result<SyncStatus, AppError> {
        if !self.is_due() {
            debug!("Master data is fresh, skipping sync");
            return Ok(SyncStatus::Fresh);
        }
        self.sync(token).await.map(|_| SyncStatus::Synced)
    }
}

impl Inner {
    fn current_snapshot(&self) -> Arc<MasterDataSnapshot> {
        match self.snapshot.read() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace_snapshot(&self, snapshot: Arc<MasterDataSnapshot>) {
        match self.snapshot.write() {
            Ok(mut s) => *s = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    fn record(&self, attempt: DateTime<Utc>, success: bool) {
        let meta = match self.meta.lock() {
            Ok(mut meta) => {
                meta.last_attempt = Some(attempt);
                if success {
                    meta.last_success = Some(attempt);
                }
                meta.clone()
            }
            Err(_) => return,
        };
        if let Err(e) = self.cache.save_sync_metadata(&meta) {
            warn!(error = %e, "Failed to persist sync metadata");
        }
    }

    async fn run(&self, token: &str) -> SyncResult {
        let started = self.clock.now();
        info!("Syncing master data");

        let snapshot = match self.backend.fetch_master_data(token).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record(started, false);
                warn!(error = %e, "Master data sync failed, keeping cached snapshot");
                return Err(if e.is_auth() {
                    AppError::AuthRejected
                } else {
                    AppError::SyncFailed(e.to_string())
                });
            }
        };

        if let Err(e) = self.cache.save_master_data(&snapshot) {
            self.record(started, false);
            warn!(error = %e, "Failed to persist master data");
            return Err(AppError::persist(e));
        }

        let snapshot = Arc::new(snapshot);
        self.replace_snapshot(snapshot.clone());
        self.record(started, true);
        info!(
            schools = snapshot.schools.len(),
            questionnaires = snapshot.questionnaires.len(),
            questions = snapshot.questions.len(),
            "Master data synced"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use anyhow::anyhow;

    use crate::api::fake::{fixtures, FakeBackend, Reply};
    use crate::api::ApiError;
    use crate::cache::{LocalStore, MemoryStore};
    use crate::clock::ManualClock;
    use crate::connectivity::Reachability;

    struct Harness {
        backend: Arc<FakeBackend>,
        cache: CacheManager,
        connectivity: Connectivity,
        clock: Arc<ManualClock>,
        sync: MasterDataSync,
    }

    fn harness_with_store(store: Arc<dyn LocalStore>) -> Harness {
        let backend = Arc::new(FakeBackend::new());
        let cache = CacheManager::new(store);
        let connectivity = Connectivity::new(Reachability::Online);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let sync = MasterDataSync::new(
            backend.clone(),
            cache.clone(),
            connectivity.clone(),
            clock.clone(),
            Duration::hours(24),
        );
        Harness {
            backend,
            cache,
            connectivity,
            clock,
            sync,
        }
    }

    fn harness() -> Harness {
        harness_with_store(Arc::new(MemoryStore::new()))
    }

    /// Store whose writes always fail
    struct ReadOnlyStore(MemoryStore);

    impl LocalStore for ReadOnlyStore {
        fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
            self.0.get(key)
        }
        fn put(&self, _key: &str, _value: &[u8]) -> anyhow::Result<()> {
            Err(anyhow!("disk full"))
        }
        fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.0.remove(key)
        }
    }

    #[tokio::test]
    async fn test_sync_replaces_and_persists_snapshot() {
        let h = harness();
        let snapshot = h.sync.sync(Some("tok")).await.unwrap();
        assert_eq!(*snapshot, fixtures::snapshot());
        assert_eq!(*h.sync.snapshot(), fixtures::snapshot());
        assert_eq!(h.cache.load_master_data().unwrap().unwrap().data, fixtures::snapshot());
        assert!(h.sync.last_sync().is_some());
    }

    #[tokio::test]
    async fn test_missing_token_makes_no_call() {
        let h = harness();
        assert_eq!(h.sync.sync(None).await.unwrap_err(), AppError::AuthMissing);
        assert_eq!(h.sync.sync(Some("   ")).await.unwrap_err(), AppError::AuthMissing);
        assert_eq!(h.backend.calls_to("master"), 0);
    }

    #[tokio::test]
    async fn test_offline_makes_no_call() {
        let h = harness();
        h.connectivity.set(Reachability::Unknown);
        assert_eq!(
            h.sync.sync(Some("tok")).await.unwrap_err(),
            AppError::NetworkUnreachable
        );
        assert_eq!(h.backend.calls_to("master"), 0);
    }

    #[tokio::test]
    async fn test_failed_sync_keeps_snapshot() {
        let h = harness();
        h.sync.sync(Some("tok")).await.unwrap();
        let before = h.sync.snapshot();

        h.backend
            .set_master(Reply::Fail(|| ApiError::ServerError("boom".to_string())));
        h.clock.advance(Duration::minutes(5));
        let err = h.sync.sync(Some("tok")).await.unwrap_err();

        assert!(matches!(err, AppError::SyncFailed(_)));
        assert_eq!(h.sync.snapshot(), before);
        assert_eq!(h.sync.last_attempt(), Some(h.clock.now()));
        assert!(h.sync.last_sync() < h.sync.last_attempt());
    }

    #[tokio::test]
    async fn test_rejected_token_keeps_snapshot_readable() {
        let h = harness();
        h.sync.sync(Some("tok")).await.unwrap();

        h.backend.set_master(Reply::Fail(|| ApiError::Unauthorized));
        let err = h.sync.sync(Some("expired")).await.unwrap_err();

        assert_eq!(err, AppError::AuthRejected);
        assert!(err.requires_login());
        assert_eq!(h.sync.snapshot().schools.len(), 2);
    }

    #[tokio::test]
    async fn test_persist_failure_leaves_memory_untouched() {
        let h = harness_with_store(Arc::new(ReadOnlyStore(MemoryStore::new())));
        let err = h.sync.sync(Some("tok")).await.unwrap_err();
        assert!(matches!(err, AppError::PersistFailed(ref m) if m.contains("disk full")));
        assert!(h.sync.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_sync_is_idempotent() {
        let h = harness();
        let first = h.sync.sync(Some("tok")).await.unwrap();
        let second = h.sync.sync(Some("tok")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(h.backend.calls_to("master"), 2);
    }

    #[tokio::test]
    async fn test_sync_if_due_throttles() {
        let h = harness();
        assert_eq!(h.sync.sync_if_due(Some("tok")).await.unwrap(), SyncStatus::Synced);
        assert_eq!(h.sync.sync_if_due(Some("tok")).await.unwrap(), SyncStatus::Fresh);
        assert_eq!(h.backend.calls_to("master"), 1);

        h.clock.advance(Duration::hours(24));
        assert_eq!(h.sync.sync_if_due(Some("tok")).await.unwrap(), SyncStatus::Synced);
        assert_eq!(h.backend.calls_to("master"), 2);
    }

    #[tokio::test]
    async fn test_failed_attempt_also_throttles() {
        let h = harness();
        h.backend.set_master(Reply::Fail(|| ApiError::Timeout));
        assert!(h.sync.sync_if_due(Some("tok")).await.is_err());
        assert_eq!(h.sync.sync_if_due(Some("tok")).await.unwrap(), SyncStatus::Fresh);
        assert_eq!(h.backend.calls_to("master"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_syncs_share_one_request() {
        let h = harness();
        h.backend.set_master_delay(StdDuration::from_millis(50));
        let a = h.sync.clone();
        let b = h.sync.clone();
        let (ra, rb) = tokio::join!(a.sync(Some("tok")), b.sync(Some("tok")));
        assert_eq!(ra.unwrap(), rb.unwrap());
        assert_eq!(h.backend.calls_to("master"), 1);

        // The guard is released once the request settles
        h.sync.sync(Some("tok")).await.unwrap();
        assert_eq!(h.backend.calls_to("master"), 2);
    }

    #[tokio::test]
    async fn test_load_cached_restores_state() {
        let h = harness();
        h.sync.sync(Some("tok")).await.unwrap();

        let reopened = MasterDataSync::new(
            h.backend.clone(),
            h.cache.clone(),
            h.connectivity.clone(),
            h.clock.clone(),
            Duration::hours(24),
        );
        assert!(reopened.snapshot().is_empty());
        assert!(reopened.load_cached());
        assert_eq!(*reopened.snapshot(), fixtures::snapshot());
        assert!(!reopened.is_due());
    }
}
