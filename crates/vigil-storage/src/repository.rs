use crate::{KVStore, KeyEncoder, Result, StorageError, Transaction};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use vigil_core::{HttpMethod, NewProbeResult, ProbeDefinition, ProbeId, ProbeResult, ProbeStatus};

/// Fields supplied by an operator when creating a probe
#[derive(Debug, Clone)]
pub struct DefinitionDraft {
    pub interval: String,
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub body: serde_json::Value,
}

/// Typed access to probe definitions and probe results
#[derive(Clone)]
pub struct ProbeRepository {
    store: Arc<dyn KVStore>,
}

impl ProbeRepository {
    pub fn new(store: Arc<dyn KVStore>) -> Self {
        Self { store }
    }

    /// Persist a new active definition under a freshly allocated id
    pub fn create_definition(&self, draft: DefinitionDraft) -> Result<ProbeDefinition> {
        let mut txn = self.store.transaction()?;
        let id = next_id(txn.as_mut(), KeyEncoder::NEXT_PROBE_ID)?;

        let now = Utc::now();
        let definition = ProbeDefinition {
            id,
            interval: draft.interval,
            url: draft.url,
            method: draft.method,
            headers: draft.headers,
            body: draft.body,
            status: ProbeStatus::Active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        write_definition(txn.as_mut(), &definition)?;
        txn.commit()?;

        debug!(probe_id = id, "Created probe definition");
        Ok(definition)
    }

    /// Fetch a definition, soft-deleted ones included
    pub fn get_definition(&self, id: ProbeId) -> Result<Option<ProbeDefinition>> {
        match self.store.get(KeyEncoder::definition_key(id).as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All definitions that are not soft-deleted, ordered by id
    pub fn list_definitions(&self) -> Result<Vec<ProbeDefinition>> {
        let mut definitions = Vec::new();
        for (_, value) in self.store.scan(KeyEncoder::DEFINITION_PREFIX.as_bytes())? {
            let definition: ProbeDefinition = serde_json::from_slice(&value)?;
            if !definition.is_deleted() {
                definitions.push(definition);
            }
        }
        Ok(definitions)
    }

    /// Definitions that should be scheduled right now
    pub fn active_definitions(&self) -> Result<Vec<ProbeDefinition>> {
        Ok(self
            .list_definitions()?
            .into_iter()
            .filter(ProbeDefinition::is_schedulable)
            .collect())
    }

    /// Overwrite a stored definition.
    ///
    /// `created_at` is kept from the stored copy and `updated_at` is bumped
    /// so that every saved version is strictly newer than the previous one.
    pub fn save_definition(&self, mut definition: ProbeDefinition) -> Result<ProbeDefinition> {
        let mut txn = self.store.transaction()?;
        let current = read_definition(txn.as_ref(), definition.id)?;

        definition.created_at = current.created_at;
        definition.updated_at = next_version(current.updated_at);

        write_definition(txn.as_mut(), &definition)?;
        txn.commit()?;

        debug!(
            probe_id = definition.id,
            status = %definition.status,
            "Saved probe definition"
        );
        Ok(definition)
    }

    /// Mark a definition as deleted; the record itself is kept
    pub fn soft_delete_definition(&self, id: ProbeId) -> Result<ProbeDefinition> {
        let mut txn = self.store.transaction()?;
        let mut definition = read_definition(txn.as_ref(), id)?;
        if definition.is_deleted() {
            txn.rollback()?;
            return Err(StorageError::key_not_found(KeyEncoder::definition_key(id)));
        }

        let version = next_version(definition.updated_at);
        definition.updated_at = version;
        definition.deleted_at = Some(version);

        write_definition(txn.as_mut(), &definition)?;
        txn.commit()?;

        debug!(probe_id = id, "Soft-deleted probe definition");
        Ok(definition)
    }

    /// Append a probe result under a freshly allocated result id
    pub fn insert_result(&self, result: NewProbeResult) -> Result<ProbeResult> {
        let mut txn = self.store.transaction()?;
        let id = next_id(txn.as_mut(), KeyEncoder::NEXT_RESULT_ID)?;

        let record = ProbeResult::from_new(id, result, Utc::now());
        let key = KeyEncoder::result_key(record.probe_id, id);
        txn.put(key.as_bytes(), &serde_json::to_vec(&record)?)?;
        txn.commit()?;

        Ok(record)
    }

    /// Results recorded for one probe, oldest first
    pub fn results_for(&self, probe_id: ProbeId) -> Result<Vec<ProbeResult>> {
        self.store
            .scan(KeyEncoder::result_prefix(probe_id).as_bytes())?
            .into_iter()
            .map(|(_, value)| -> Result<ProbeResult> { Ok(serde_json::from_slice(&value)?) })
            .collect()
    }
}

/// Smallest timestamp strictly after `previous`, or now if that is later
fn next_version(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

fn next_id(txn: &mut dyn Transaction, counter_key: &str) -> Result<u64> {
    let current = match txn.get(counter_key.as_bytes())? {
        Some(bytes) => KeyEncoder::decode_counter(&bytes).ok_or_else(|| {
            StorageError::database_error(format!("Corrupt id counter at {}", counter_key), None)
        })?,
        None => 0,
    };

    let id = current + 1;
    txn.put(counter_key.as_bytes(), &KeyEncoder::encode_counter(id))?;
    Ok(id)
}

fn read_definition(txn: &dyn Transaction, id: ProbeId) -> Result<ProbeDefinition> {
    let key = KeyEncoder::definition_key(id);
    let bytes = txn
        .get(key.as_bytes())?
        .ok_or_else(|| StorageError::key_not_found(key))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_definition(txn: &mut dyn Transaction, definition: &ProbeDefinition) -> Result<()> {
    let key = KeyEncoder::definition_key(definition.id);
    txn.put(key.as_bytes(), &serde_json::to_vec(definition)?)
}
