//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is alive.
//!
//! # Tasks
//! - Expiry sweep: Removes expired cache entries at a fixed interval

mod sweep;

pub use sweep::{spawn_sweep_task, DEFAULT_SWEEP_INTERVAL};
