//! Vigil Core - Domain types shared by every Vigil crate
//!
//! This crate provides:
//! - Probe definitions and probe results
//! - Interval parsing in `1h30m10s` notation
//! - The Schedule-Change Event wire format
//! - Error types with miette diagnostics

pub mod error;
pub mod events;
pub mod interval;
pub mod types;

// Re-export commonly used types
pub use error::{Result, VigilError};
pub use events::{decode_event, encode_event, SCHEDULE_CHANNEL};
pub use interval::{format_interval, parse_interval, MAX_INTERVAL};
pub use types::{
    HttpMethod, NewProbeResult, ProbeDefinition, ProbeId, ProbeResult, ProbeStatus, ResultId,
    ScheduleAction,
};

/// Serialize a value to JSON
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        VigilError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Serialize a value to pretty JSON
pub fn to_json_pretty<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| {
        VigilError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a value from JSON
pub fn from_json<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| {
        VigilError::serialization_error(
            format!("Failed to deserialize from JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pretty_json_is_multiline() {
        let result = ProbeResult {
            id: 4,
            probe_id: 1,
            headers: Default::default(),
            body: "down".to_string(),
            status_code: 503,
            created_at: chrono::Utc::now(),
        };

        let json = to_json_pretty(&result).unwrap();
        assert!(json.contains('\n'));

        let back: ProbeResult = from_json(&json).unwrap();
        assert_eq!(back, result);
        assert!(!back.is_success());
    }
}
