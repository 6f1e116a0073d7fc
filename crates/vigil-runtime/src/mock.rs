use crate::error::{Result, RuntimeError};
use crate::notify::DispatchReport;
use crate::traits::{Notifier, ProbeStore};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;
use vigil_core::{NewProbeResult, ProbeDefinition, ProbeId, ProbeResult};

/// In-memory probe store for tests
///
/// Holds definitions and results in memory. Fetch and persist failures can
/// be switched on to exercise error paths.
#[derive(Default)]
pub struct MockProbeStore {
    definitions: RwLock<Vec<ProbeDefinition>>,
    results: RwLock<Vec<ProbeResult>>,
    next_result_id: AtomicU64,
    fail_fetch: AtomicBool,
    fail_persist: AtomicBool,
}

impl MockProbeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definitions(definitions: Vec<ProbeDefinition>) -> Self {
        Self {
            definitions: RwLock::new(definitions),
            ..Self::default()
        }
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    pub async fn results(&self) -> Vec<ProbeResult> {
        self.results.read().await.clone()
    }

    pub async fn results_for(&self, probe_id: ProbeId) -> Vec<ProbeResult> {
        self.results
            .read()
            .await
            .iter()
            .filter(|r| r.probe_id == probe_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ProbeStore for MockProbeStore {
    async fn fetch_active_definitions(&self) -> Result<Vec<ProbeDefinition>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RuntimeError::internal_error("Mock: fetch failure injected"));
        }
        Ok(self
            .definitions
            .read()
            .await
            .iter()
            .filter(|d| d.is_schedulable())
            .cloned()
            .collect())
    }

    async fn persist_probe_result(&self, result: NewProbeResult) -> Result<ProbeResult> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(RuntimeError::internal_error("Mock: persist failure injected"));
        }
        let id = self.next_result_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = ProbeResult::from_new(id, result, Utc::now());
        debug!("Mock: stored result {} for probe {}", id, record.probe_id);
        self.results.write().await.push(record.clone());
        Ok(record)
    }
}

/// Notifier that records every alert instead of sending it
#[derive(Default)]
pub struct MockNotifier {
    sent: RwLock<Vec<(String, String)>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts received so far as (subject, message)
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, subject: &str, message: &str) -> DispatchReport {
        self.sent
            .write()
            .await
            .push((subject.to_string(), message.to_string()));
        DispatchReport {
            delivered: 1,
            failed: 0,
        }
    }
}
