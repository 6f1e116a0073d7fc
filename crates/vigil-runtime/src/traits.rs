use crate::error::Result;
use crate::notify::DispatchReport;
use async_trait::async_trait;
use vigil_core::{NewProbeResult, ProbeDefinition, ProbeResult};

/// Storage operations the pipeline consumes from the CRUD layer
///
/// Implemented by `RepositoryStore` over the redb repository, and by
/// `MockProbeStore` for tests.
#[async_trait]
pub trait ProbeStore: Send + Sync {
    /// All definitions that are active and not deleted. Used once at startup.
    async fn fetch_active_definitions(&self) -> Result<Vec<ProbeDefinition>>;

    /// Record the outcome of one completed probe execution
    async fn persist_probe_result(&self, result: NewProbeResult) -> Result<ProbeResult>;
}

/// Failure alert dispatch
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `subject` and `message` to every configured target, once
    async fn send(&self, subject: &str, message: &str) -> DispatchReport;
}
