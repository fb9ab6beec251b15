use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{MasterDataSync, SyncStatus};
use crate::auth::TokenProvider;
use crate::connectivity::Connectivity;
use crate::error::AppError;
use crate::notice::{Notice, NoticeBus};

/// Pause after connectivity returns before syncing, so a flapping
/// connection settles first.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// How often to check whether the sync interval has passed while the
/// connection stays up.
const RECHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Background task running [`MasterDataSync::sync_if_due`] at start, when
/// connectivity returns, and periodically while online.
pub struct SyncScheduler {
    sync: MasterDataSync,
    connectivity: Connectivity,
    tokens: Arc<dyn TokenProvider>,
    notices: NoticeBus,
    settle: Duration,
}

impl SyncScheduler {
    pub fn new(
        sync: MasterDataSync,
        connectivity: Connectivity,
        tokens: Arc<dyn TokenProvider>,
        notices: NoticeBus,
    ) -> Self {
        Self {
            sync,
            connectivity,
            tokens,
            notices,
            settle: SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut rx = self.connectivity.subscribe();
        rx.borrow_and_update();

        tokio::time::sleep(self.settle).await;
        let mut ticker = tokio::time::interval(RECHECK_INTERVAL);
        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        debug!("Connectivity monitor closed, stopping sync scheduler");
                        return;
                    }
                    let online = rx.borrow_and_update().is_online();
                    self.notices.publish(Notice::Connectivity { online });
                    if online {
                        tokio::time::sleep(self.settle).await;
                        self.tick().await;
                    }
                }
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    async fn tick(&self) {
        if !self.connectivity.is_reachable() {
            return;
        }
        let token = self.tokens.current_token();
        match self.sync.sync_if_due(token.as_deref()).await {
            Ok(SyncStatus::Synced) => self.notices.publish(Notice::MasterDataSynced),
            Ok(SyncStatus::Fresh) => {}
            Err(AppError::AuthMissing) => debug!("Not signed in, skipping sync"),
            Err(AppError::NetworkUnreachable) => debug!("Went offline before sync"),
            Err(AppError::AuthRejected) => {
                info!("Sync rejected the session token");
                self.notices.publish(Notice::SessionExpired);
            }
            Err(AppError::PersistFailed(cause)) => {
                self.notices.publish(Notice::PersistFailed(cause))
            }
            Err(e) => self.notices.publish(Notice::SyncFailed(e.to_string())),
        }
    }
}
