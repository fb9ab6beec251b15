//! Local caching module for offline data access.
//!
//! Everything the client needs while offline lives here: the master data
//! snapshot, sync bookkeeping, the pending submission queue, the logged-in
//! user and per-screen payloads. Entries are JSON wrapped in
//! [`CachedData`] so every screen can show how old its data is.
//!
//! Storage is pluggable through [`LocalStore`]. [`FileStore`] keeps one
//! file per key and can encrypt values with a [`Vault`].

pub mod manager;
pub mod store;
pub mod vault;

pub use manager::{CacheAges, CacheManager, CachedData, SyncMetadata};
pub use store::{FileStore, LocalStore, MemoryStore};
pub use vault::Vault;
