use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::auth::TokenProvider;
use crate::cache::CacheManager;
use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{PendingSubmission, SubmissionPayload};

/// Result of one pass over the queue
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    /// Ids confirmed by the server and removed from the queue
    pub delivered: Vec<String>,
    /// Ids that stay queued for the next attempt
    pub failed: Vec<String>,
    /// The server rejected the token used for at least one item
    pub session_expired: bool,
    /// Items left in the queue after the pass
    pub remaining: usize,
}

struct Inner {
    cache: CacheManager,
    clock: Arc<dyn Clock>,
    /// Guards every read-modify-write of the persisted list
    list_lock: Mutex<()>,
    /// Only one drain at a time
    drain_lock: Mutex<()>,
    seq: AtomicU64,
}

/// Durable FIFO of questionnaire responses that have not reached the server.
///
/// Every change is written through to the cache before it returns; there is
/// no in-memory copy that could diverge from what is stored.
#[derive(Clone)]
pub struct PendingQueue {
    inner: Arc<Inner>,
}

impl PendingQueue {
    pub fn new(cache: CacheManager, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                clock,
                list_lock: Mutex::new(()),
                drain_lock: Mutex::new(()),
                seq: AtomicU64::new(0),
            }),
        }
    }

    /// Wrap a payload into a submission with a fresh id
    pub fn new_submission(
        &self,
        payload: SubmissionPayload,
        auth_token: Option<String>,
    ) -> PendingSubmission {
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        PendingSubmission::new(payload, auth_token, self.inner.clock.now(), seq)
    }

    /// Append a submission. Duplicates are kept as separate entries.
    pub async fn enqueue(&self, submission: PendingSubmission) -> Result<(), AppError> {
        let _guard = self.inner.list_lock.lock().await;
        let mut items = self.load()?;
        items.push(submission);
        self.inner
            .cache
            .save_pending(&items)
            .map_err(AppError::persist)?;
        info!(pending = items.len(), "Submission queued");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<PendingSubmission>, AppError> {
        let _guard = self.inner.list_lock.lock().await;
        self.load()
    }

    pub async fn len(&self) -> Result<usize, AppError> {
        Ok(self.list().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.len().await? == 0)
    }

    fn load(&self) -> Result<Vec<PendingSubmission>, AppError> {
        self.inner.cache.load_pending().map_err(|e| {
            warn!(error = %e, "Failed to read pending submissions");
            AppError::persist(e)
        })
    }

    /// Try to deliver every queued submission, in insertion order.
    ///
    /// Each item is sent with the active session token, or with the token
    /// stored alongside it when nobody is signed in. Delivered items are
    /// removed; everything else stays for the next pass. Submissions queued
    /// while the drain runs are preserved.
    pub async fn drain(
        &self,
        backend: &dyn Backend,
        tokens: &dyn TokenProvider,
    ) -> Result<DrainReport, AppError> {
        let _drain = self.inner.drain_lock.lock().await;
        let items = self.list().await?;
        if items.is_empty() {
            return Ok(DrainReport::default());
        }
        info!(count = items.len(), "Draining pending submissions");

        let active = tokens
            .current_token()
            .filter(|t| !t.trim().is_empty());
        let mut report = DrainReport::default();

        for item in items {
            let token = active.clone().or_else(|| {
                item.auth_token
                    .clone()
                    .filter(|t| !t.trim().is_empty())
            });
            let Some(token) = token else {
                debug!(id = %item.id, "No token available for queued submission");
                report.failed.push(item.id);
                continue;
            };

            match backend.submit_answers(&token, &item.payload).await {
                Ok(ack) if ack.is_success() => {
                    debug!(id = %item.id, "Queued submission delivered");
                    report.delivered.push(item.id);
                }
                Ok(ack) => {
                    warn!(id = %item.id, status = %ack.status, "Server declined queued submission");
                    report.failed.push(item.id);
                }
                Err(e) => {
                    if e.is_auth() {
                        report.session_expired = true;
                    }
                    warn!(id = %item.id, error = %e, "Failed to deliver queued submission");
                    report.failed.push(item.id);
                }
            }
        }

        let _guard = self.inner.list_lock.lock().await;
        let mut current = self.load()?;
        if !report.delivered.is_empty() {
            current.retain(|item| !report.delivered.contains(&item.id));
            self.inner
                .cache
                .save_pending(&current)
                .map_err(AppError::persist)?;
        }
        report.remaining = current.len();
        info!(
            delivered = report.delivered.len(),
            remaining = report.remaining,
            session_expired = report.session_expired,
            "Drain finished"
        );
        Ok(report)
    }
}
