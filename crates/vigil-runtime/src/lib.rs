// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

pub mod definitions;
pub mod error;
pub mod job;
pub mod mock;
pub mod notify;
pub mod probes;
pub mod reconciler;
pub mod store;
#[cfg(test)]
mod testing;
pub mod traits;

// Re-export primary types
pub use error::{Result, RuntimeError};
pub use mock::{MockNotifier, MockProbeStore};
pub use store::RepositoryStore;
pub use traits::{Notifier, ProbeStore};

// Re-export pipeline components
pub use definitions::DefinitionCommands;
pub use job::ProbeJob;
pub use probes::{ProbeExecutor, ProbeExecutorConfig, ProbeOutcome};
pub use reconciler::{Reconciled, ScheduleReconciler};

// Re-export notification types
pub use notify::{
    DiscordChannel, DiscordConfig, DispatchReport, NotificationChannel, NotificationConfig,
    NotificationEscalator, SlackChannel, SlackConfig,
};
