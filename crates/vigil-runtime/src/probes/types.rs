use crate::notify::DispatchReport;
use std::time::Duration;
use vigil_core::ResultId;

/// HTTP client settings for probe execution
#[derive(Debug, Clone)]
pub struct ProbeExecutorConfig {
    /// Upper bound for one round trip, body included
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ProbeExecutorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: format!("vigil/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// What happened during one probe execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// No response was obtained; nothing was recorded or sent
    RequestFailed(String),
    /// A response came back and was handled
    Completed {
        status_code: u16,
        /// `None` when recording the result failed
        result_id: Option<ResultId>,
        /// Set when the status was not 200
        notification: Option<DispatchReport>,
    },
}

impl ProbeOutcome {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProbeOutcome::Completed { status_code, .. } => Some(*status_code),
            ProbeOutcome::RequestFailed(_) => None,
        }
    }
}
