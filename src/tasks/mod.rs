//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Eviction Sweep: Deletes entries unused for longer than the configured age

mod sweep;

pub use sweep::spawn_sweep_task;
