use crate::error::{Result, VigilError};
use crate::interval::parse_interval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Stable identifier of a probe definition
pub type ProbeId = u64;

/// Identifier of a persisted probe result
pub type ResultId = u64;

/// Lifecycle status of a probe definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// Probe is scheduled on every instance
    #[serde(rename = "start", alias = "active")]
    Active,
    /// Probe is kept but not executed
    #[serde(rename = "stop", alias = "stopped")]
    Stopped,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Active => "start",
            ProbeStatus::Stopped => "stop",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeStatus {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "start" | "active" => Ok(ProbeStatus::Active),
            "stop" | "stopped" => Ok(ProbeStatus::Stopped),
            _ => Err(VigilError::invalid_status(s)),
        }
    }
}

/// HTTP method used by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(VigilError::invalid_method(s)),
        }
    }
}

/// What a scheduler should do with a definition it has just received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleAction {
    /// Install or replace the schedule entry
    Upsert,
    /// Drop any schedule entry for the probe
    Remove,
}

/// Probe definition: what to check, how often and how.
///
/// This is also the Schedule-Change Event payload, so deserialization is
/// tolerant: unknown fields are ignored and optional fields default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeDefinition {
    pub id: ProbeId,
    /// Interval between executions, e.g. "1h30m10s"
    pub interval: String,
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: serde_json::Value,
    pub status: ProbeStatus,
    pub created_at: DateTime<Utc>,
    /// Monotonic version of this definition
    pub updated_at: DateTime<Utc>,
    /// Soft-deletion marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ProbeDefinition {
    /// Build a fresh, active definition
    pub fn new(
        id: ProbeId,
        interval: impl Into<String>,
        url: impl Into<String>,
        method: HttpMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            interval: interval.into(),
            url: url.into(),
            method,
            headers: BTreeMap::new(),
            body: serde_json::Value::Null,
            status: ProbeStatus::Active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Active and not soft-deleted
    pub fn is_schedulable(&self) -> bool {
        self.status == ProbeStatus::Active && !self.is_deleted()
    }

    pub fn schedule_action(&self) -> ScheduleAction {
        if self.is_schedulable() {
            ScheduleAction::Upsert
        } else {
            ScheduleAction::Remove
        }
    }

    pub fn parsed_interval(&self) -> Result<Duration> {
        parse_interval(&self.interval)
    }

    /// Short human label used in logs and alert subjects
    pub fn describe(&self) -> String {
        format!("id : {} | url : {} | method : {}", self.id, self.url, self.method)
    }
}

/// A probe outcome waiting to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProbeResult {
    pub probe_id: ProbeId,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
    pub status_code: u16,
}

/// Recorded outcome of one probe execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub id: ResultId,
    pub probe_id: ProbeId,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub body: String,
    pub status_code: u16,
    pub created_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn from_new(id: ResultId, new: NewProbeResult, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            probe_id: new.probe_id,
            headers: new.headers,
            body: new.body,
            status_code: new.status_code,
            created_at,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_accepts_both_spellings() {
        let active: ProbeStatus = serde_json::from_str("\"start\"").unwrap();
        assert_eq!(active, ProbeStatus::Active);
        let active: ProbeStatus = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(active, ProbeStatus::Active);
        let stopped: ProbeStatus = serde_json::from_str("\"stopped\"").unwrap();
        assert_eq!(stopped, ProbeStatus::Stopped);

        assert_eq!(serde_json::to_string(&ProbeStatus::Stopped).unwrap(), "\"stop\"");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("STOP".parse::<ProbeStatus>().unwrap(), ProbeStatus::Stopped);
        assert!("paused".parse::<ProbeStatus>().is_err());
    }

    #[test]
    fn test_method_from_str_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("Options".parse::<HttpMethod>().unwrap(), HttpMethod::Options);
        assert!(matches!(
            "TRACE".parse::<HttpMethod>(),
            Err(VigilError::InvalidMethod { .. })
        ));
    }

    #[test]
    fn test_schedule_action() {
        let mut def = ProbeDefinition::new(1, "1s", "https://example.test/ok", HttpMethod::Get);
        assert_eq!(def.schedule_action(), ScheduleAction::Upsert);

        def.status = ProbeStatus::Stopped;
        assert_eq!(def.schedule_action(), ScheduleAction::Remove);

        def.status = ProbeStatus::Active;
        def.deleted_at = Some(Utc::now());
        assert_eq!(def.schedule_action(), ScheduleAction::Remove);
    }

    #[test]
    fn test_definition_tolerates_missing_and_unknown_fields() {
        let json = r#"{
            "id": 7,
            "interval": "30s",
            "url": "https://example.test/health",
            "method": "POST",
            "status": "start",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z",
            "owner": "team-a"
        }"#;

        let def: ProbeDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.id, 7);
        assert_eq!(def.method, HttpMethod::Post);
        assert!(def.headers.is_empty());
        assert!(def.body.is_null());
        assert!(def.deleted_at.is_none());
        assert_eq!(def.parsed_interval().unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_describe() {
        let def = ProbeDefinition::new(3, "1m", "https://example.test", HttpMethod::Head);
        assert_eq!(def.describe(), "id : 3 | url : https://example.test | method : HEAD");
    }
}
