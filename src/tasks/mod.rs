//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: Removes expired keys from the in-process stores
//! - Metrics reporter: Logs hit ratios at a configured interval

mod cleanup;
mod reporter;

pub use cleanup::spawn_cleanup_task;
pub use reporter::spawn_metrics_reporter;
