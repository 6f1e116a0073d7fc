use vigil_core::{ProbeId, ResultId};

/// Key layout for the single Vigil table.
///
/// Ids are zero-padded so that lexicographic key order equals numeric order
/// and prefix scans come back sorted.
pub struct KeyEncoder;

impl KeyEncoder {
    pub const DEFINITION_PREFIX: &'static str = "probes/";
    pub const RESULT_PREFIX: &'static str = "results/";
    pub const NEXT_PROBE_ID: &'static str = "meta/next_probe_id";
    pub const NEXT_RESULT_ID: &'static str = "meta/next_result_id";

    /// probes/{id}
    pub fn definition_key(id: ProbeId) -> String {
        format!("{}{:020}", Self::DEFINITION_PREFIX, id)
    }

    /// results/{probe_id}/
    pub fn result_prefix(probe_id: ProbeId) -> String {
        format!("{}{:020}/", Self::RESULT_PREFIX, probe_id)
    }

    /// results/{probe_id}/{result_id}
    pub fn result_key(probe_id: ProbeId, result_id: ResultId) -> String {
        format!("{}{:020}", Self::result_prefix(probe_id), result_id)
    }

    /// Encode an id counter value
    pub fn encode_counter(value: u64) -> [u8; 8] {
        value.to_be_bytes()
    }

    /// Decode an id counter value, `None` if the stored bytes are not a counter
    pub fn decode_counter(bytes: &[u8]) -> Option<u64> {
        <[u8; 8]>::try_from(bytes).ok().map(u64::from_be_bytes)
    }
}
