//! `hush` Core Library
//!
//! Shared functionality for `hush` components:
//! - Configuration resolution and hierarchy
//! - Clock abstraction for TTL decisions
//! - `SQLite` pool helpers
//! - Tracing initialisation
//! - Common error types

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use clock::{Clock, ManualClock, SystemClock, unix_timestamp};
pub use config::Config;
pub use error::{Error, Result};
