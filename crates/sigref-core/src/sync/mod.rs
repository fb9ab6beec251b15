//! Master data synchronization.
//!
//! [`MasterDataSync`] owns the in-memory master data snapshot and refreshes
//! it from the server. [`SyncScheduler`] decides when: at start, after
//! connectivity returns, and whenever the sync interval has passed.

pub mod engine;
pub mod scheduler;

pub use engine::{MasterDataSync, SyncStatus};
pub use scheduler::{SyncScheduler, SETTLE_DELAY};
