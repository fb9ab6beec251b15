//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Session`: the logged-in user, persisted through the cache
//! - `SessionHandle`: shared view of the session, the app's [`TokenProvider`]
//! - `CredentialStore`: OS keychain storage for the password and the
//!   device secret behind the local vault

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Session, SessionHandle, TokenProvider};
