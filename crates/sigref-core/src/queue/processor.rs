use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{DrainReport, PendingQueue};
use crate::api::Backend;
use crate::auth::TokenProvider;
use crate::connectivity::Connectivity;
use crate::notice::{Notice, NoticeBus};

/// Drain the queue once and publish what happened.
///
/// Does nothing while offline or when the queue is empty.
pub async fn deliver_pending(
    queue: &PendingQueue,
    backend: &dyn Backend,
    tokens: &dyn TokenProvider,
    connectivity: &Connectivity,
    notices: &NoticeBus,
) -> Option<DrainReport> {
    if !connectivity.is_reachable() {
        debug!("Offline, not draining pending submissions");
        return None;
    }
    match queue.is_empty().await {
        Ok(true) => return None,
        Ok(false) => {}
        Err(e) => {
            notices.publish(Notice::PersistFailed(e.to_string()));
            return None;
        }
    }
    match queue.drain(backend, tokens).await {
        Ok(report) => {
            if !report.delivered.is_empty() {
                notices.publish(Notice::QueueDrained {
                    delivered: report.delivered.len(),
                    remaining: report.remaining,
                });
            }
            if report.session_expired {
                notices.publish(Notice::SessionExpired);
            }
            Some(report)
        }
        Err(e) => {
            warn!(error = %e, "Draining pending submissions failed");
            notices.publish(Notice::PersistFailed(e.to_string()));
            None
        }
    }
}

/// Background task that delivers queued submissions when connectivity
/// returns or when asked to.
pub struct QueueProcessor {
    queue: PendingQueue,
    backend: Arc<dyn Backend>,
    tokens: Arc<dyn TokenProvider>,
    connectivity: Connectivity,
    notices: NoticeBus,
}

/// Handle to a running [`QueueProcessor`]
pub struct QueueProcessorHandle {
    trigger: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl QueueProcessorHandle {
    /// Ask for a drain. Requests made while one is pending coalesce.
    pub fn trigger(&self) {
        if self.trigger.try_send(()).is_err() {
            debug!("Drain already requested");
        }
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

impl QueueProcessor {
    pub fn new(
        queue: PendingQueue,
        backend: Arc<dyn Backend>,
        tokens: Arc<dyn TokenProvider>,
        connectivity: Connectivity,
        notices: NoticeBus,
    ) -> Self {
        Self {
            queue,
            backend,
            tokens,
            connectivity,
            notices,
        }
    }

    pub fn spawn(self) -> QueueProcessorHandle {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(self.run(rx));
        QueueProcessorHandle { trigger: tx, task }
    }

    async fn run(self, mut requests: mpsc::Receiver<()>) {
        let mut online = self.connectivity.subscribe();
        let was_online = online.borrow_and_update().is_online();
        if was_online {
            self.drain().await;
        }

        loop {
            tokio::select! {
                changed = online.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if online.borrow_and_update().is_online() {
                        self.drain().await;
                    }
                }
                request = requests.recv() => {
                    if request.is_none() {
                        debug!("All queue processor handles dropped, stopping");
                        return;
                    }
                    self.drain().await;
                }
            }
        }
    }

    async fn drain(&self) {
        deliver_pending(
            &self.queue,
            self.backend.as_ref(),
            self.tokens.as_ref(),
            &self.connectivity,
            &self.notices,
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::broadcast;

    use crate::api::fake::{fixtures, FakeBackend};
    use crate::api::ApiError;
    use crate::cache::{CacheManager, MemoryStore};
    use crate::clock::SystemClock;
    use crate::connectivity::Reachability;

    struct Fixed(Option<&'static str>);

    impl TokenProvider for Fixed {
        fn current_token(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn queue() -> PendingQueue {
        PendingQueue::new(
            CacheManager::new(Arc::new(MemoryStore::new())),
            Arc::new(SystemClock),
        )
    }

    async fn add(queue: &PendingQueue, school_id: i64) {
        let item = queue.new_submission(fixtures::payload(school_id), Some("t".to_string()));
        queue.enqueue(item).await.unwrap();
    }

    async fn next_notice(rx: &mut broadcast::Receiver<Notice>) -> Notice {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no notice published")
            .unwrap()
    }

    #[tokio::test]
    async fn test_offline_submission_delivered_when_back_online() {
        let queue = queue();
        add(&queue, 1).await;
        let backend = Arc::new(FakeBackend::new());
        let connectivity = Connectivity::new(Reachability::Offline);
        let notices = NoticeBus::new();
        let mut rx = notices.subscribe();

        let handle = QueueProcessor::new(
            queue.clone(),
            backend.clone(),
            Arc::new(Fixed(Some("t"))),
            connectivity.clone(),
            notices,
        )
        .spawn();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(backend.calls_to("submit"), 0);

        connectivity.set(Reachability::Online);
        assert_eq!(
            next_notice(&mut rx).await,
            Notice::QueueDrained {
                delivered: 1,
                remaining: 0
            }
        );
        assert!(queue.is_empty().await.unwrap());
        handle.abort();
    }

    #[tokio::test]
    async fn test_manual_trigger_drains() {
        let queue = queue();
        let backend = Arc::new(FakeBackend::new());
        let connectivity = Connectivity::new(Reachability::Online);
        let notices = NoticeBus::new();
        let mut rx = notices.subscribe();

        let handle = QueueProcessor::new(
            queue.clone(),
            backend.clone(),
            Arc::new(Fixed(None)),
            connectivity,
            notices,
        )
        .spawn();
        tokio::time::sleep(Duration::from_millis(20)).await;

        add(&queue, 1).await;
        add(&queue, 2).await;
        handle.trigger();
        assert_eq!(
            next_notice(&mut rx).await,
            Notice::QueueDrained {
                delivered: 2,
                remaining: 0
            }
        );
        handle.abort();
    }

    #[tokio::test]
    async fn test_session_expired_published() {
        let queue = queue();
        add(&queue, 1).await;
        let backend = FakeBackend::new();
        backend.set_submit(|_, _| Err(ApiError::Unauthorized));
        let connectivity = Connectivity::new(Reachability::Online);
        let notices = NoticeBus::new();
        let mut rx = notices.subscribe();

        let report = deliver_pending(&queue, &backend, &Fixed(Some("t")), &connectivity, &notices)
            .await
            .unwrap();
        assert!(report.session_expired);
        assert_eq!(next_notice(&mut rx).await, Notice::SessionExpired);
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_no_drain_while_offline() {
        let queue = queue();
        add(&queue, 1).await;
        let backend = FakeBackend::new();
        let connectivity = Connectivity::new(Reachability::Unknown);
        let report = deliver_pending(
            &queue,
            &backend,
            &Fixed(Some("t")),
            &connectivity,
            &NoticeBus::new(),
        )
        .await;
        assert!(report.is_none());
        assert_eq!(backend.calls_to("submit"), 0);
    }
}
