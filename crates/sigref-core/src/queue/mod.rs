//! Pending submission queue.
//!
//! Responses that cannot reach the server are stored in a [`PendingQueue`]
//! and replayed by the [`QueueProcessor`] once the device is online again.

pub mod pending;
pub mod processor;

pub use pending::{DrainReport, PendingQueue};
pub use processor::{deliver_pending, QueueProcessor, QueueProcessorHandle};
