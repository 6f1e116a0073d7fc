use crate::error::{Result, RuntimeError};
use crate::traits::ProbeStore;
use async_trait::async_trait;
use vigil_core::{NewProbeResult, ProbeDefinition, ProbeResult};
use vigil_storage::ProbeRepository;

/// `ProbeStore` backed by the redb probe repository.
///
/// Repository calls may wait on the database file lock, so they run on the
/// blocking pool.
pub struct RepositoryStore {
    repository: ProbeRepository,
}

impl RepositoryStore {
    pub fn new(repository: ProbeRepository) -> Self {
        Self { repository }
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(ProbeRepository) -> vigil_storage::Result<T> + Send + 'static,
    {
        let repository = self.repository.clone();
        tokio::task::spawn_blocking(move || op(repository))
            .await
            .map_err(|e| RuntimeError::internal_error(format!("storage task failed: {}", e)))?
            .map_err(RuntimeError::from)
    }
}

#[async_trait]
impl ProbeStore for RepositoryStore {
    async fn fetch_active_definitions(&self) -> Result<Vec<ProbeDefinition>> {
        self.blocking(|repository| repository.active_definitions()).await
    }

    async fn persist_probe_result(&self, result: NewProbeResult) -> Result<ProbeResult> {
        self.blocking(move |repository| repository.insert_result(result)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tempfile::tempdir;
    use vigil_core::{HttpMethod, ProbeStatus};
    use vigil_storage::{DefinitionDraft, RedbBackend};

    #[tokio::test]
    async fn test_repository_store_round_trip() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::new(dir.path().join("vigil.redb")).unwrap();
        let repository = ProbeRepository::new(Arc::new(backend));

        let created = repository
            .create_definition(DefinitionDraft {
                interval: "1m".to_string(),
                url: "https://example.test".to_string(),
                method: HttpMethod::Get,
                headers: BTreeMap::new(),
                body: serde_json::Value::Null,
            })
            .unwrap();
        let mut stopped = repository
            .create_definition(DefinitionDraft {
                interval: "1m".to_string(),
                url: "https://example.test/other".to_string(),
                method: HttpMethod::Get,
                headers: BTreeMap::new(),
                body: serde_json::Value::Null,
            })
            .unwrap();
        stopped.status = ProbeStatus::Stopped;
        repository.save_definition(stopped).unwrap();

        let store = RepositoryStore::new(repository.clone());
        let active = store.fetch_active_definitions().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, created.id);

        let saved = store
            .persist_probe_result(NewProbeResult {
                probe_id: created.id,
                headers: BTreeMap::new(),
                body: "ok".to_string(),
                status_code: 200,
            })
            .await
            .unwrap();
        assert_eq!(repository.results_for(created.id).unwrap(), vec![saved]);
    }
}
