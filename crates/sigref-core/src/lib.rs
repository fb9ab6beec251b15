//! Core library for the SIGREF offline school-monitoring client.
//!
//! The crate keeps a device-local copy of the monitoring reference data
//! (schools, questionnaires, questions, sectors), renders screens from
//! that cache while refreshing in the background, and queues
//! questionnaire responses that could not reach the server so they can be
//! replayed once the device is back online.
//!
//! - [`api`]: REST client for the SIGREF server and the [`api::Backend`] seam
//! - [`auth`]: login session and keychain credentials
//! - [`cache`]: local key-value store, encryption vault, typed cache entries
//! - [`connectivity`]: reachability monitor
//! - [`sync`]: master data sync engine and its scheduler
//! - [`queue`]: pending submission queue and its processor
//! - [`screens`]: screen controllers and the questionnaire response flow
//! - [`context`]: [`AppContext`], which builds the services and owns the background tasks

pub mod api;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod context;
pub mod error;
pub mod models;
pub mod notice;
pub mod queue;
pub mod screens;
pub mod sync;

pub use context::AppContext;
pub use error::AppError;
pub use notice::{Notice, NoticeBus};
