//! Vigil Scheduler - Recurring execution of probe callbacks
//!
//! This crate provides:
//! - A minimal timer engine capability and its tokio implementation
//! - The Probe Registry holding at most one schedule entry per probe
//! - The Recurring Scheduler with version-aware add and remove

pub mod error;
pub mod registry;
pub mod scheduler;
pub mod timer;

// Re-export commonly used types
pub use error::{Result, SchedulerError};
pub use registry::{AddOutcome, ProbeRegistry, RemoveOutcome};
pub use scheduler::RecurringScheduler;
pub use timer::{TickFn, TimerEngine, TimerHandle, TokioTimerEngine};
