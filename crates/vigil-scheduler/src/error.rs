// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;
use vigil_core::{ProbeId, VigilError};

/// Scheduler error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// Interval could not be turned into a positive period
    #[error("Cannot schedule probe {key}: invalid interval '{interval}'")]
    #[diagnostic(
        code(scheduler::invalid_interval),
        help("Fix the probe definition; the existing schedule for this probe was left unchanged")
    )]
    InvalidInterval {
        #[allow(unused)]
        key: ProbeId,
        #[allow(unused)]
        interval: String,
        #[source]
        #[allow(unused)]
        source: VigilError,
    },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Create an InvalidInterval error
    pub fn invalid_interval(key: ProbeId, interval: impl Into<String>, source: VigilError) -> Self {
        Self::InvalidInterval {
            key,
            interval: interval.into(),
            source,
        }
    }
}
