//! Network reachability monitor.
//!
//! Reachability is three-valued. Anything other than a confirmed
//! [`Reachability::Online`] is treated as offline by callers, and observers
//! must tolerate spurious transitions.

use std::time::Duration;

use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Timeout for a single reachability probe.
/// Short on purpose: a slow answer is treated as offline.
const PROBE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Online,
    Offline,
    /// The platform could not be queried
    Unknown,
}

impl Reachability {
    pub fn is_online(&self) -> bool {
        matches!(self, Reachability::Online)
    }
}

/// Shared reachability state. Clone is cheap and all clones observe the same state.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: watch::Sender<Reachability>,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(Reachability::Unknown)
    }
}

impl Connectivity {
    pub fn new(initial: Reachability) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> Reachability {
        *self.tx.borrow()
    }

    /// True only when connectivity is confirmed
    pub fn is_reachable(&self) -> bool {
        self.current().is_online()
    }

    /// Publish a new state. Observers are woken only on actual changes.
    pub fn set(&self, state: Reachability) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            info!(?state, "Connectivity changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Reachability> {
        self.tx.subscribe()
    }

    /// Probe `url` once and publish the result
    pub async fn check(&self, url: &str) -> Reachability {
        let state = match probe_client() {
            Ok(client) => probe(&client, url).await,
            Err(e) => {
                debug!(error = %e, "Failed to build probe client");
                Reachability::Unknown
            }
        };
        self.set(state);
        state
    }

    /// Periodically probe `url` and publish the result.
    pub fn spawn_probe(&self, url: String, interval: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let client = match probe_client() {
                Ok(c) => c,
                Err(e) => {
                    debug!(error = %e, "Failed to build probe client");
                    this.set(Reachability::Unknown);
                    return;
                }
            };
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                this.set(probe(&client, &url).await);
            }
        })
    }
}

fn probe_client() -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
        .build()
}

/// Any HTTP response means the server is reachable, whatever its status;
/// only transport failures count as offline.
async fn probe(client: &Client, url: &str) -> Reachability {
    match client.head(url).send().await {
        Ok(_) => Reachability::Online,
        Err(e) => {
            debug!(error = %e, "Reachability probe failed");
            Reachability::Offline
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_not_reachable() {
        let conn = Connectivity::default();
        assert_eq!(conn.current(), Reachability::Unknown);
        assert!(!conn.is_reachable());
        conn.set(Reachability::Online);
        assert!(conn.is_reachable());
    }

    #[tokio::test]
    async fn test_observers_woken_only_on_change() {
        let conn = Connectivity::new(Reachability::Offline);
        let mut rx = conn.subscribe();
        conn.set(Reachability::Offline);
        assert!(!rx.has_changed().unwrap());
        conn.set(Reachability::Online);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Reachability::Online);
    }

    #[tokio::test]
    async fn test_probe_marks_unreachable_host_offline() {
        let conn = Connectivity::new(Reachability::Unknown);
        let mut rx = conn.subscribe();
        // Port 9 on localhost is expected to refuse connections
        let handle = conn.spawn_probe("http://127.0.0.1:9/".to_string(), Duration::from_secs(60));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Reachability::Offline);
        handle.abort();
    }

    #[tokio::test]
    async fn test_check_reaches_live_server() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/").with_status(404).create_async().await;
        let conn = Connectivity::default();
        assert_eq!(conn.check(&server.url()).await, Reachability::Online);
        assert!(conn.is_reachable());
    }
}
