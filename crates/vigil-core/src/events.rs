use crate::error::Result;
use crate::types::ProbeDefinition;
use crate::{from_json, to_json};

/// Logical channel shared by every instance of the fleet
pub const SCHEDULE_CHANNEL: &str = "vigil:probe-schedule";

/// Encode a definition as a Schedule-Change Event payload.
///
/// The payload is the definition itself with no envelope.
pub fn encode_event(definition: &ProbeDefinition) -> Result<String> {
    to_json(definition)
}

/// Decode a Schedule-Change Event payload
pub fn decode_event(payload: &str) -> Result<ProbeDefinition> {
    from_json(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VigilError;
    use crate::types::{HttpMethod, ProbeStatus};

    #[test]
    fn test_encode_then_decode_keeps_definition() {
        let mut def = ProbeDefinition::new(1, "1s", "https://example.test/ok", HttpMethod::Get);
        def.headers.insert("X-Token".to_string(), "abc".to_string());
        def.body = serde_json::json!({"ping": true});

        let payload = encode_event(&def).unwrap();
        assert!(payload.contains("\"status\":\"start\""));
        assert!(!payload.contains("deleted_at"));

        assert_eq!(decode_event(&payload).unwrap(), def);
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let payload = r#"{"id":2,"interval":"5m","url":"http://a","method":"GET",
            "status":"stop","created_at":"2024-01-01T00:00:00Z",
            "updated_at":"2024-01-01T00:00:00Z","schema":3,"tags":["x"]}"#;

        let def = decode_event(payload).unwrap();
        assert_eq!(def.id, 2);
        assert_eq!(def.status, ProbeStatus::Stopped);
    }

    #[test]
    fn test_decode_malformed_payload() {
        for payload in ["", "not json", "{\"id\":\"one\"}", "[]"] {
            assert!(matches!(
                decode_event(payload),
                Err(VigilError::SerializationError { .. })
            ));
        }
    }
}
