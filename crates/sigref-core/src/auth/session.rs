use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::api::ApiClient;
use crate::cache::CacheManager;
use crate::connectivity::Connectivity;
use crate::error::AppError;
use crate::models::UserProfile;

/// Source of the bearer token of the active session.
pub trait TokenProvider: Send + Sync {
    fn current_token(&self) -> Option<String>;
}

/// The logged-in user, persisted in the cache so the app reopens signed in.
///
/// Tokens are issued by the server without an expiry; a session ends on
/// logout or when the server starts rejecting the token.
pub struct Session {
    cache: CacheManager,
    user: Option<UserProfile>,
}

impl Session {
    pub fn new(cache: CacheManager) -> Self {
        Self { cache, user: None }
    }

    /// Restore the stored user, if any
    pub fn load(&mut self) -> bool {
        self.user = self.cache.load_user().filter(|u| !u.token.trim().is_empty());
        self.user.is_some()
    }

    /// Replace the active user and persist it
    pub fn update(&mut self, user: UserProfile) -> Result<(), AppError> {
        self.cache.save_user(&user).map_err(AppError::persist)?;
        self.user = Some(user);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), AppError> {
        self.user = None;
        self.cache.clear_user().map_err(AppError::persist)
    }

    pub fn token(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.token.as_str())
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.token().is_some()
    }
}

/// Shared, thread-safe view of the [`Session`].
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<RwLock<Session>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    /// Session restored from the cache
    pub fn restore(cache: CacheManager) -> Self {
        let mut session = Session::new(cache);
        if session.load() {
            info!("Restored stored session");
        }
        Self::new(session)
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.inner.read().ok().and_then(|s| s.user().cloned())
    }

    pub fn is_signed_in(&self) -> bool {
        self.inner.read().map(|s| s.is_valid()).unwrap_or(false)
    }

    pub fn sign_in(&self, user: UserProfile) -> Result<(), AppError> {
        let mut session = self
            .inner
            .write()
            .map_err(|_| AppError::persist("session lock poisoned"))?;
        session.update(user)
    }

    pub fn sign_out(&self) -> Result<(), AppError> {
        let mut session = self
            .inner
            .write()
            .map_err(|_| AppError::persist("session lock poisoned"))?;
        info!("Signing out");
        session.clear()
    }

    /// Authenticate against the server and start a session.
    ///
    /// Login needs the server, so it is refused outright while offline.
    pub async fn login(
        &self,
        client: &ApiClient,
        connectivity: &Connectivity,
        username: &str,
        password: &str,
    ) -> Result<UserProfile, AppError> {
        if !connectivity.is_reachable() {
            return Err(AppError::NetworkUnreachable);
        }
        let user = client.authenticate(username, password).await.map_err(|e| {
            warn!(username, error = %e, "Login failed");
            AppError::from(e)
        })?;
        self.sign_in(user.clone())?;
        info!(username, "Logged in");
        Ok(user)
    }
}

impl TokenProvider for SessionHandle {
    fn current_token(&self) -> Option<String> {
        self.inner
            .read()
            .ok()
            .and_then(|s| s.token().map(str::to_string))
    }
}
