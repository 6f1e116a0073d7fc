use crate::error::{Result, RuntimeError};
use reqwest::Url;
use std::sync::Arc;
use tracing::{error, info, warn};
use vigil_core::{encode_event, parse_interval, ProbeDefinition, ProbeId, ProbeResult, ProbeStatus};
use vigil_storage::{DefinitionDraft, ProbeRepository};
use vigil_sync::SyncChannel;

/// Operator-facing definition changes.
///
/// Each command commits to the repository first and then broadcasts the
/// resulting definition so every instance can reconcile. A failed broadcast
/// is logged and the committed write stands.
pub struct DefinitionCommands {
    repository: ProbeRepository,
    channel: Arc<dyn SyncChannel>,
}

impl DefinitionCommands {
    pub fn new(repository: ProbeRepository, channel: Arc<dyn SyncChannel>) -> Self {
        Self {
            repository,
            channel,
        }
    }

    /// Create a new active probe
    pub async fn create(&self, draft: DefinitionDraft) -> Result<ProbeDefinition> {
        validate_draft(&draft)?;

        let definition = self.repository.create_definition(draft)?;
        info!(
            probe_id = definition.id,
            url = %definition.url,
            interval = %definition.interval,
            "Created probe"
        );

        self.publish(&definition).await;
        Ok(definition)
    }

    /// Switch a probe between active and stopped
    pub async fn set_status(&self, id: ProbeId, status: ProbeStatus) -> Result<ProbeDefinition> {
        let mut definition = self.existing(id)?;
        if definition.status == status {
            return Err(RuntimeError::invalid_request(
                format!("probe {} is already '{}'", id, status),
                "Only a change of status is accepted",
            ));
        }

        definition.status = status;
        let saved = self.repository.save_definition(definition)?;
        info!(probe_id = id, status = %status, "Changed probe status");

        self.publish(&saved).await;
        Ok(saved)
    }

    /// Soft-delete a probe
    pub async fn delete(&self, id: ProbeId) -> Result<ProbeDefinition> {
        self.existing(id)?;

        let deleted = self.repository.soft_delete_definition(id)?;
        info!(probe_id = id, "Deleted probe");

        self.publish(&deleted).await;
        Ok(deleted)
    }

    pub fn get(&self, id: ProbeId) -> Result<ProbeDefinition> {
        self.existing(id)
    }

    pub fn list(&self) -> Result<Vec<ProbeDefinition>> {
        Ok(self.repository.list_definitions()?)
    }

    /// Recorded results of a probe, oldest first
    pub fn results(&self, id: ProbeId) -> Result<Vec<ProbeResult>> {
        if self.repository.get_definition(id)?.is_none() {
            return Err(RuntimeError::definition_not_found(id));
        }
        Ok(self.repository.results_for(id)?)
    }

    fn existing(&self, id: ProbeId) -> Result<ProbeDefinition> {
        match self.repository.get_definition(id)? {
            Some(definition) if !definition.is_deleted() => Ok(definition),
            _ => Err(RuntimeError::definition_not_found(id)),
        }
    }

    async fn publish(&self, definition: &ProbeDefinition) {
        let payload = match encode_event(definition) {
            Ok(payload) => payload,
            Err(e) => {
                error!(probe_id = definition.id, error = %e, "Failed to encode schedule change");
                return;
            }
        };

        if let Err(e) = self.channel.publish(&payload).await {
            warn!(
                probe_id = definition.id,
                channel = %self.channel.channel(),
                error = %e,
                "Failed to publish schedule change"
            );
        }
    }
}

fn validate_draft(draft: &DefinitionDraft) -> Result<()> {
    parse_interval(&draft.interval).map_err(|e| {
        RuntimeError::invalid_request(
            e.to_string(),
            "Use a positive duration such as \"30s\", \"5m\" or \"1h30m\"",
        )
    })?;

    let url = Url::parse(&draft.url).map_err(|e| {
        RuntimeError::invalid_request(
            format!("invalid probe URL '{}': {}", draft.url, e),
            "Use an absolute URL such as https://example.com/health",
        )
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RuntimeError::invalid_request(
            format!("unsupported URL scheme '{}'", url.scheme()),
            "Probes only support http and https targets",
        ));
    }

    Ok(())
}
