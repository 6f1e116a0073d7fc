pub mod executor;
pub mod types;

pub use executor::ProbeExecutor;
pub use types::{ProbeExecutorConfig, ProbeOutcome};
