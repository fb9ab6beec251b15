//! Dismissible, user-visible notices published by background services.

use tokio::sync::broadcast;

/// Capacity of the notice broadcast channel.
/// Slow subscribers lose the oldest notices rather than blocking services.
const NOTICE_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Master data refreshed from the server
    MasterDataSynced,
    /// Master data sync attempted but failed; cached data kept
    SyncFailed(String),
    /// Queued responses delivered (delivered, still pending)
    QueueDrained { delivered: usize, remaining: usize },
    /// The server rejected the session; the user must log in again
    SessionExpired,
    /// A response was stored locally and will be sent later
    SavedOffline,
    /// A local write failed; data may have been lost
    PersistFailed(String),
    /// Connectivity changed
    Connectivity { online: bool },
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::MasterDataSynced => "Data updated from the server.".to_string(),
            Notice::SyncFailed(cause) => format!("Could not sync data: {}", cause),
            Notice::QueueDrained {
                delivered,
                remaining,
            } => {
                if *remaining == 0 {
                    format!("{} pending response(s) sent.", delivered)
                } else {
                    format!(
                        "{} pending response(s) sent, {} still waiting.",
                        delivered, remaining
                    )
                }
            }
            Notice::SessionExpired => {
                "Your session expired. Please log in again.".to_string()
            }
            Notice::SavedOffline => {
                "Response saved on this device. It will be sent when you are online.".to_string()
            }
            Notice::PersistFailed(cause) => format!("Could not save locally: {}", cause),
            Notice::Connectivity { online: true } => "Back online.".to_string(),
            Notice::Connectivity { online: false } => {
                "You are offline. Showing saved data.".to_string()
            }
        }
    }
}

/// Fan-out of notices to every interested screen.
#[derive(Debug, Clone)]
pub struct NoticeBus {
    tx: broadcast::Sender<Notice>,
}

impl Default for NoticeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NoticeBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish a notice. Having no subscriber is not an error.
    pub fn publish(&self, notice: Notice) {
        tracing::debug!(?notice, "Publishing notice");
        let _ = self.tx.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bus_delivers_to_subscribers() {
        let bus = NoticeBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Notice::SessionExpired);
        assert_eq!(rx.recv().await.unwrap(), Notice::SessionExpired);
    }

    #[test]
    fn test_publish_without_subscribers() {
        NoticeBus::new().publish(Notice::MasterDataSynced);
    }

    #[test]
    fn test_queue_drained_message() {
        let done = Notice::QueueDrained {
            delivered: 2,
            remaining: 0,
        };
        assert_eq!(done.message(), "2 pending response(s) sent.");
        let partial = Notice::QueueDrained {
            delivered: 1,
            remaining: 3,
        };
        assert!(partial.message().contains("3 still waiting"));
    }
}
