use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::auth::TokenProvider;
use crate::cache::CachedData;
use crate::connectivity::Connectivity;
use crate::error::AppError;
use crate::notice::{Notice, NoticeBus};

/// What a screen is currently showing.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenState<T> {
    /// Nothing to show yet
    Loading,
    /// Cached data, a refresh may be under way
    ShowingCached { data: T, cached_at: DateTime<Utc> },
    /// Data fetched from the server during this visit
    ShowingFresh(T),
    /// Cached data while offline
    ShowingStaleOffline { data: T, cached_at: DateTime<Utc> },
    Error(AppError),
}

impl<T> ScreenState<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            ScreenState::ShowingCached { data, .. }
            | ScreenState::ShowingStaleOffline { data, .. }
            | ScreenState::ShowingFresh(data) => Some(data),
            ScreenState::Loading | ScreenState::Error(_) => None,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, ScreenState::ShowingStaleOffline { .. })
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            ScreenState::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// How a screen gets its data.
#[async_trait]
pub trait ScreenSource: Send + Sync + 'static {
    type Data: Clone + Send + Sync + 'static;

    /// The locally available slice, if any
    fn load_cached(&self) -> Option<CachedData<Self::Data>>;

    /// Fetch fresh data from the server and cache it
    async fn fetch(&self, token: &str) -> Result<Self::Data, AppError>;

    /// Work to do whenever the screen comes into view
    async fn on_focus(&self) {}
}

/// Drives one screen: cached data first, then a background refresh.
///
/// Results arriving after [`ScreenController::unmount`] are dropped.
pub struct ScreenController<S: ScreenSource> {
    source: Arc<S>,
    tokens: Arc<dyn TokenProvider>,
    connectivity: Connectivity,
    notices: NoticeBus,
    state: watch::Sender<ScreenState<S::Data>>,
    mounted: AtomicBool,
    /// Bumped on every mount and unmount; stale results carry an old value
    visit: AtomicU64,
    /// When the data shown as fresh was fetched
    fetched_at: Mutex<Option<DateTime<Utc>>>,
}

impl<S: ScreenSource> ScreenController<S> {
    pub fn new(
        source: S,
        tokens: Arc<dyn TokenProvider>,
        connectivity: Connectivity,
        notices: NoticeBus,
    ) -> Self {
        let (state, _rx) = watch::channel(ScreenState::Loading);
        Self {
            source: Arc::new(source),
            tokens,
            connectivity,
            notices,
            state,
            mounted: AtomicBool::new(false),
            visit: AtomicU64::new(0),
            fetched_at: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn state(&self) -> ScreenState<S::Data> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScreenState<S::Data>> {
        self.state.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Show cached data immediately, then refresh from the server
    pub async fn mount(&self) -> ScreenState<S::Data> {
        let visit = self.visit.fetch_add(1, Ordering::SeqCst) + 1;
        self.mounted.store(true, Ordering::SeqCst);

        let initial = match self.source.load_cached() {
            Some(cached) => ScreenState::ShowingCached {
                data: cached.data,
                cached_at: cached.cached_at,
            },
            None => ScreenState::Loading,
        };
        self.publish(visit, initial);

        self.source.on_focus().await;
        self.revalidate(visit).await;
        self.state()
    }

    /// Pull-to-refresh. Whatever is displayed stays until new data arrives.
    pub async fn refresh(&self) -> ScreenState<S::Data> {
        if !self.is_mounted() {
            return self.state();
        }
        let visit = self.visit.load(Ordering::SeqCst);
        self.source.on_focus().await;
        self.revalidate(visit).await;
        self.state()
    }

    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
        self.visit.fetch_add(1, Ordering::SeqCst);
    }

    fn publish(&self, visit: u64, state: ScreenState<S::Data>) -> bool {
        if !self.is_mounted() || self.visit.load(Ordering::SeqCst) != visit {
            debug!("Discarding result for a screen no longer shown");
            return false;
        }
        self.state.send_replace(state);
        true
    }

    /// The data on screen with its cache time, falling back to the cache
    fn displayed(&self) -> Option<(S::Data, DateTime<Utc>)> {
        let shown = match &*self.state.borrow() {
            ScreenState::ShowingCached { data, cached_at }
            | ScreenState::ShowingStaleOffline { data, cached_at } => {
                Some((data.clone(), *cached_at))
            }
            ScreenState::ShowingFresh(data) => {
                let fetched_at = self.fetched_at.lock().ok().and_then(|at| *at);
                Some((data.clone(), fetched_at.unwrap_or_else(Utc::now)))
            }
            ScreenState::Loading | ScreenState::Error(_) => None,
        };
        shown.or_else(|| {
            self.source
                .load_cached()
                .map(|cached| (cached.data, cached.cached_at))
        })
    }

    async fn revalidate(&self, visit: u64) {
        if !self.connectivity.is_reachable() {
            let state = match self.displayed() {
                Some((data, cached_at)) => ScreenState::ShowingStaleOffline { data, cached_at },
                None => ScreenState::Error(AppError::NetworkUnreachable),
            };
            self.publish(visit, state);
            return;
        }

        let token = self
            .tokens
            .current_token()
            .filter(|t| !t.trim().is_empty());
        let result = match token {
            Some(token) => self.source.fetch(&token).await,
            None => Err(AppError::AuthMissing),
        };

        match result {
            Ok(data) => {
                let fetched_at = Utc::now();
                if self.publish(visit, ScreenState::ShowingFresh(data)) {
                    if let Ok(mut at) = self.fetched_at.lock() {
                        *at = Some(fetched_at);
                    }
                }
            }
            Err(err) => self.show_failure(visit, err),
        }
    }

    /// Keep displayed data on failure; only an empty screen shows the error.
    /// Data kept after a failed fetch is shown as stale, except on auth
    /// errors, where the login notice takes over.
    fn show_failure(&self, visit: u64, err: AppError) {
        warn!(error = %err, "Screen refresh failed");
        let Some((data, cached_at)) = self.displayed() else {
            self.publish(visit, ScreenState::Error(err));
            return;
        };

        let notice = match &err {
            AppError::AuthMissing | AppError::AuthRejected => Notice::SessionExpired,
            other => Notice::SyncFailed(other.to_string()),
        };
        let state = if err.requires_login() {
            ScreenState::ShowingCached { data, cached_at }
        } else {
            ScreenState::ShowingStaleOffline { data, cached_at }
        };
        if self.publish(visit, state) {
            self.notices.publish(notice);
        }
    }
}
